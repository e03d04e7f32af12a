//! Comment entity.
//!
//! Stored as a document in the `comments` collection. A comment belongs to
//! exactly one post; `author` and `post` never change after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::store::{Collection, Record};

/// Represents a comment on a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Authoring user ID (immutable)
    pub author: i64,

    /// Commented post ID (immutable)
    pub post: i64,

    /// Comment text
    pub body: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Default for Comment {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            author: 0,
            post: 0,
            body: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Comment {
    const COLLECTION: Collection = Collection::Comments;

    fn id(&self) -> i64 {
        self.id
    }
}
