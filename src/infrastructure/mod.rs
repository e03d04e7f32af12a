//! Infrastructure Layer
//!
//! Contains implementations for external concerns including:
//! - Entity store backends (in-memory document store)
//! - Prometheus metrics

pub mod metrics;
pub mod store;
