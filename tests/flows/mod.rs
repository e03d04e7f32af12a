//! End-to-End Flow Tests
//!
//! Each module drives the assembled core through its public surface:
//! credentials resolved by the access gate, mutations through the
//! services, live deliveries through bus subscriptions.

mod content_tests;
mod event_tests;
mod messaging_tests;
mod social_tests;
