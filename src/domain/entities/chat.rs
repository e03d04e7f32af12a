//! Chat entity.
//!
//! Stored as a document in the `chats` collection. The `pair_key` field
//! carries a unique index so at most one chat exists per unordered pair of
//! participants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::store::{Collection, Record};

/// Represents a direct-message chat between exactly two users.
///
/// `participants` is fixed at creation. `messages` holds message ids in
/// commit order; `last_message` is a denormalized copy of the most recent
/// message text, mutated only by the messaging service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// The two participant user ids (fixed at creation)
    pub participants: [i64; 2],

    /// Canonical "{min}:{max}" participant key (unique)
    pub pair_key: String,

    /// Ids of messages in this chat, in commit order
    pub messages: Vec<i64>,

    /// Text of the most recent message, if any
    pub last_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last message activity
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// Unique-indexed field name.
    pub const PAIR_KEY: &'static str = "pair_key";

    // Field names consumed by store write ops.
    pub const MESSAGES: &'static str = "messages";

    /// Canonical key for an unordered participant pair.
    pub fn pair_key_for(a: i64, b: i64) -> String {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        format!("{}:{}", lo, hi)
    }

    /// Check whether `user_id` participates in this chat.
    pub fn includes(&self, user_id: i64) -> bool {
        self.participants.contains(&user_id)
    }

    /// Check whether this chat is between exactly `a` and `b`, in either order.
    pub fn is_pair(&self, a: i64, b: i64) -> bool {
        self.pair_key == Self::pair_key_for(a, b)
    }

    /// The participant other than `user_id`, if `user_id` is a participant.
    pub fn other_participant(&self, user_id: i64) -> Option<i64> {
        match self.participants {
            [a, b] if a == user_id => Some(b),
            [a, b] if b == user_id => Some(a),
            _ => None,
        }
    }
}

impl Default for Chat {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            participants: [0, 0],
            pair_key: Chat::pair_key_for(0, 0),
            messages: Vec::new(),
            last_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Chat {
    const COLLECTION: Collection = Collection::Chats;

    fn id(&self) -> i64 {
        self.id
    }
}
