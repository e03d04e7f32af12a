//! # Domain Layer
//!
//! The domain layer contains the core business objects of the social graph.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Core domain entities (User, Post, Comment, Chat, Message)
//! - **events**: Domain events published after mutations commit
//! - **store**: The transactional entity store contract
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure layers
//! - The store trait defines the data access contract; implementations
//!   live in the infrastructure layer (dependency inversion)
//! - Counter/set invariants are expressed in the store's write vocabulary

pub mod entities;
pub mod events;
pub mod store;

// Re-export commonly used types
pub use entities::*;
pub use events::{DomainEvent, EventTopic};
pub use store::{Collection, DocRef, EntityStore, Record, Transaction, WriteOp};
