//! # Domain Entities
//!
//! Core domain entities representing the main business objects of the
//! social graph. All entities are stored as JSON documents, one collection
//! per entity type.
//!
//! ## Entities
//!
//! - **User**: account plus friend/request/post/chat membership sets
//! - **Post**: authored content with like and comment sets
//! - **Comment**: a comment belonging to exactly one post
//! - **Chat**: a direct-message thread between exactly two users
//! - **Message**: a message belonging to exactly one chat
//!
//! Counters (`post_count`, `like_count`, `comment_count`) are denormalized
//! and must never diverge from the cardinality of their companion set; the
//! store's counter-paired write ops keep them in sync.

mod chat;
mod comment;
mod message;
mod post;
mod user;

// Re-export User entity
pub use user::User;

// Re-export Post entity
pub use post::Post;

// Re-export Comment entity
pub use comment::Comment;

// Re-export Chat entity
pub use chat::Chat;

// Re-export Message entity
pub use message::Message;
