//! User entity.
//!
//! Stored as a document in the `users` collection. The `username` field
//! carries a unique index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::store::{Collection, Record};

/// Represents a user account and their place in the social graph.
///
/// Graph fields hold ids only; the records they point at live in their own
/// collections and are re-fetched before use.
///
/// Invariants maintained by the services:
/// - `friends` is symmetric: `b` in `a.friends` iff `a` in `b.friends`
/// - `x` in `a.sent_friend_requests` iff `a` in `x.received_friend_requests`
/// - `post_count == posts.len()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Username (unique)
    pub username: String,

    /// Display name (optional)
    pub display_name: Option<String>,

    /// URL to the user's avatar image
    pub avatar_url: Option<String>,

    /// Bio/about text
    pub bio: Option<String>,

    /// Ids of mutual friends (set semantics)
    pub friends: Vec<i64>,

    /// Ids this user has sent a pending friend request to (set semantics)
    pub sent_friend_requests: Vec<i64>,

    /// Ids this user has a pending friend request from (set semantics)
    pub received_friend_requests: Vec<i64>,

    /// Ids of posts authored by this user (set semantics)
    pub posts: Vec<i64>,

    /// Denormalized count of `posts`
    pub post_count: i64,

    /// Ids of chats this user participates in
    pub chats: Vec<i64>,

    /// Account creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Unique-indexed field name.
    pub const USERNAME: &'static str = "username";

    // Array/counter field names consumed by store write ops.
    pub const FRIENDS: &'static str = "friends";
    pub const SENT_FRIEND_REQUESTS: &'static str = "sent_friend_requests";
    pub const RECEIVED_FRIEND_REQUESTS: &'static str = "received_friend_requests";
    pub const POSTS: &'static str = "posts";
    pub const POST_COUNT: &'static str = "post_count";
    pub const CHATS: &'static str = "chats";

    /// Get the user's display name, falling back to username if not set.
    pub fn display_name_or_username(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }

    /// Check whether `user_id` is a confirmed friend.
    pub fn is_friend(&self, user_id: i64) -> bool {
        self.friends.contains(&user_id)
    }

    /// Check whether this user has a pending request from `user_id`.
    pub fn has_request_from(&self, user_id: i64) -> bool {
        self.received_friend_requests.contains(&user_id)
    }

    /// Check whether this user has a pending request to `user_id`.
    pub fn has_request_to(&self, user_id: i64) -> bool {
        self.sent_friend_requests.contains(&user_id)
    }
}

impl Default for User {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username: String::new(),
            display_name: None,
            avatar_url: None,
            bio: None,
            friends: Vec::new(),
            sent_friend_requests: Vec::new(),
            received_friend_requests: Vec::new(),
            posts: Vec::new(),
            post_count: 0,
            chats: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for User {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> i64 {
        self.id
    }
}
