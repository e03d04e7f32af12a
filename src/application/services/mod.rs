//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **SocialService**: User records, friend requests, friendships
//! - **ContentService**: Posts, likes, comments
//! - **MessagingService**: Chats and transactional message append

pub mod content_service;
pub mod messaging_service;
pub mod social_service;

// Re-export social service types
pub use social_service::{RegisterUserInput, SocialService, SocialServiceImpl, UpdateProfileInput};

// Re-export content service types
pub use content_service::{ContentService, ContentServiceImpl, CreateCommentInput, CreatePostInput};

// Re-export messaging service types
pub use messaging_service::{MessagingService, MessagingServiceImpl, SendMessageInput};
