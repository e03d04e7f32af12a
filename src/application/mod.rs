//! Application Layer
//!
//! Contains the access gate and the business logic services. This layer
//! orchestrates store transactions and event publication on top of the
//! domain contracts.

pub mod access;
pub mod services;
