//! Event Bus
//!
//! Filtered in-process publish/subscribe delivering store-resolved
//! entities to live subscribers.

pub mod router;
pub mod subscription;

// Re-export bus types
pub use router::EventBus;
pub use subscription::{EventFilter, Notification, Subscription};
