//! Post entity.
//!
//! Stored as a document in the `posts` collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::store::{Collection, Record};

/// Represents a post in the content graph.
///
/// Counter invariants maintained by the content service:
/// - `like_count == likes.len()`
/// - `comment_count == comments.len()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Authoring user ID (immutable after creation)
    pub author: i64,

    /// Post caption text
    pub caption: String,

    /// URL to the attached image, if any
    pub image_url: Option<String>,

    /// Ids of users who liked this post (set semantics)
    pub likes: Vec<i64>,

    /// Denormalized count of `likes`
    pub like_count: i64,

    /// Ids of comments on this post, in creation order
    pub comments: Vec<i64>,

    /// Denormalized count of `comments`
    pub comment_count: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Post {
    // Array/counter field names consumed by store write ops.
    pub const LIKES: &'static str = "likes";
    pub const LIKE_COUNT: &'static str = "like_count";
    pub const COMMENTS: &'static str = "comments";
    pub const COMMENT_COUNT: &'static str = "comment_count";

    /// Check whether `user_id` has liked this post.
    pub fn is_liked_by(&self, user_id: i64) -> bool {
        self.likes.contains(&user_id)
    }
}

impl Default for Post {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            author: 0,
            caption: String::new(),
            image_url: None,
            likes: Vec::new(),
            like_count: 0,
            comments: Vec::new(),
            comment_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Post {
    const COLLECTION: Collection = Collection::Posts;

    fn id(&self) -> i64 {
        self.id
    }
}
