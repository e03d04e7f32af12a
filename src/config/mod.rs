//! # Configuration Module
//!
//! This module handles application configuration loading and management.
//! Configuration can be loaded from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{environment}.toml)
//! - .env files (via dotenvy)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use social_core::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Delivery buffer: {}", settings.bus.delivery_buffer);
//! ```

mod settings;

pub use settings::*;
