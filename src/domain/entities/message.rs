//! Message entity.
//!
//! Stored as a document in the `messages` collection. A message belongs to
//! exactly one chat; `sender`, `receiver` and `chat` never change after
//! creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::store::{Collection, Record};

/// Represents a direct message inside a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Containing chat ID (immutable)
    pub chat: i64,

    /// Sending user ID (immutable)
    pub sender: i64,

    /// Receiving user ID (immutable)
    pub receiver: i64,

    /// Message text
    pub text: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Check whether `user_id` is the sender or receiver.
    pub fn involves(&self, user_id: i64) -> bool {
        self.sender == user_id || self.receiver == user_id
    }
}

impl Default for Message {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            chat: 0,
            sender: 0,
            receiver: 0,
            text: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Message {
    const COLLECTION: Collection = Collection::Messages;

    fn id(&self) -> i64 {
        self.id
    }
}
