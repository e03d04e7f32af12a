//! # Social Core Library
//!
//! This crate provides the consistency and event-propagation core of a
//! social-networking backend:
//! - Atomic multi-record mutations over users, posts, comments, chats,
//!   and messages
//! - Denormalized counters that cannot drift from their membership sets
//! - Filtered in-process pub/sub delivering store-resolved entities to
//!   live subscribers
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Entities, the entity store contract, and domain
//!   events
//! - **Application Layer**: Access gate and business logic services
//! - **Infrastructure Layer**: In-memory transactional store and metrics
//! - **Event Bus**: Publish/subscribe router with per-subscription
//!   filters
//!
//! ## Module Structure
//!
//! ```text
//! social_core/
//! +-- config/        Configuration management
//! +-- domain/        Entities, store contract, events
//! +-- application/   Access gate and services
//! +-- bus/           Event bus and subscriptions
//! +-- infrastructure/ Store and metrics implementations
//! +-- shared/        Common utilities (errors, snowflake IDs)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Access gate and services
pub mod application;

// Event bus - Filtered pub/sub
pub mod bus;

// Infrastructure layer - Store and metrics implementations
pub mod infrastructure;

// Shared utilities
pub mod shared;

// Core assembly and lifecycle
pub mod startup;

// Telemetry and observability
pub mod telemetry;
