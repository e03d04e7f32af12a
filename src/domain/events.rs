//! Domain events.
//!
//! Events carry ids only; the event bus resolves them into full entities
//! at delivery time, so every subscriber sees the freshest committed state.

use serde::{Deserialize, Serialize};

/// Event topics, one per event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    PostLiked,
    PostCommented,
    FriendRequestReceived,
    FriendRequestAccepted,
    MessageReceived,
}

impl EventTopic {
    /// Every topic, in a fixed order.
    pub const ALL: [EventTopic; 5] = [
        EventTopic::PostLiked,
        EventTopic::PostCommented,
        EventTopic::FriendRequestReceived,
        EventTopic::FriendRequestAccepted,
        EventTopic::MessageReceived,
    ];

    /// Topic name for dispatch and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostLiked => "POST_LIKED",
            Self::PostCommented => "POST_COMMENTED",
            Self::FriendRequestReceived => "FRIEND_REQUEST_RECEIVED",
            Self::FriendRequestAccepted => "FRIEND_REQUEST_ACCEPTED",
            Self::MessageReceived => "MESSAGE_RECEIVED",
        }
    }
}

impl std::fmt::Display for EventTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A committed state change, published after its transaction commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "d")]
pub enum DomainEvent {
    /// A user newly liked a post.
    #[serde(rename = "POST_LIKED")]
    PostLiked { post_id: i64, user_id: i64 },

    /// A comment was added to a post.
    #[serde(rename = "POST_COMMENTED")]
    PostCommented { post_id: i64, comment_id: i64 },

    /// A friend request was delivered to a user.
    #[serde(rename = "FRIEND_REQUEST_RECEIVED")]
    FriendRequestReceived { to_user_id: i64, from_user_id: i64 },

    /// A pending friend request was accepted.
    #[serde(rename = "FRIEND_REQUEST_ACCEPTED")]
    FriendRequestAccepted { acceptor_id: i64, requester_id: i64 },

    /// A message was committed to a chat.
    #[serde(rename = "MESSAGE_RECEIVED")]
    MessageReceived { chat_id: i64, message_id: i64 },
}

impl DomainEvent {
    /// The topic this event publishes on.
    pub fn topic(&self) -> EventTopic {
        match self {
            DomainEvent::PostLiked { .. } => EventTopic::PostLiked,
            DomainEvent::PostCommented { .. } => EventTopic::PostCommented,
            DomainEvent::FriendRequestReceived { .. } => EventTopic::FriendRequestReceived,
            DomainEvent::FriendRequestAccepted { .. } => EventTopic::FriendRequestAccepted,
            DomainEvent::MessageReceived { .. } => EventTopic::MessageReceived,
        }
    }
}
