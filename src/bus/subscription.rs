//! Subscription Handles
//!
//! Filters, resolved notification payloads, and the receiving half of a
//! registered subscription.

use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::{Chat, DomainEvent, EventTopic, Post, User};

/// Per-subscription filter, one scalar argument per topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    /// Likes on one post
    PostLiked { post_id: i64 },
    /// Comments on one post
    PostCommented { post_id: i64 },
    /// Friend requests sent by one user
    FriendRequestReceived { from_user_id: i64 },
    /// Acceptances performed by one user
    FriendRequestAccepted { acceptor_id: i64 },
    /// Messages committed to one chat
    MessageReceived { chat_id: i64 },
}

impl EventFilter {
    /// The topic this filter subscribes to
    pub fn topic(&self) -> EventTopic {
        match self {
            EventFilter::PostLiked { .. } => EventTopic::PostLiked,
            EventFilter::PostCommented { .. } => EventTopic::PostCommented,
            EventFilter::FriendRequestReceived { .. } => EventTopic::FriendRequestReceived,
            EventFilter::FriendRequestAccepted { .. } => EventTopic::FriendRequestAccepted,
            EventFilter::MessageReceived { .. } => EventTopic::MessageReceived,
        }
    }

    /// Whether an event passes this filter
    pub fn matches(&self, event: &DomainEvent) -> bool {
        match (self, event) {
            (
                EventFilter::PostLiked { post_id },
                DomainEvent::PostLiked { post_id: event_post, .. },
            ) => post_id == event_post,
            (
                EventFilter::PostCommented { post_id },
                DomainEvent::PostCommented { post_id: event_post, .. },
            ) => post_id == event_post,
            (
                EventFilter::FriendRequestReceived { from_user_id },
                DomainEvent::FriendRequestReceived { from_user_id: event_from, .. },
            ) => from_user_id == event_from,
            (
                EventFilter::FriendRequestAccepted { acceptor_id },
                DomainEvent::FriendRequestAccepted { acceptor_id: event_acceptor, .. },
            ) => acceptor_id == event_acceptor,
            (
                EventFilter::MessageReceived { chat_id },
                DomainEvent::MessageReceived { chat_id: event_chat, .. },
            ) => chat_id == event_chat,
            _ => false,
        }
    }
}

/// Resolved event payload delivered to subscribers
///
/// Each event is resolved into the full entity it concerns before
/// delivery, so subscribers always see committed state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", content = "d")]
pub enum Notification {
    #[serde(rename = "POST_LIKED")]
    PostLiked(Post),
    #[serde(rename = "POST_COMMENTED")]
    PostCommented(Post),
    #[serde(rename = "FRIEND_REQUEST_RECEIVED")]
    FriendRequestReceived(User),
    #[serde(rename = "FRIEND_REQUEST_ACCEPTED")]
    FriendRequestAccepted(User),
    #[serde(rename = "MESSAGE_RECEIVED")]
    MessageReceived(Chat),
}

impl Notification {
    /// The topic this notification was delivered on
    pub fn topic(&self) -> EventTopic {
        match self {
            Notification::PostLiked(_) => EventTopic::PostLiked,
            Notification::PostCommented(_) => EventTopic::PostCommented,
            Notification::FriendRequestReceived(_) => EventTopic::FriendRequestReceived,
            Notification::FriendRequestAccepted(_) => EventTopic::FriendRequestAccepted,
            Notification::MessageReceived(_) => EventTopic::MessageReceived,
        }
    }
}

/// Deregistration half of the bus, seen from a subscription handle
pub(crate) trait Unsubscriber: Send + Sync {
    fn unregister(&self, id: u64, topic: EventTopic);
}

/// Live subscription handle
///
/// Receives notifications until dropped or closed. Dropping the handle
/// deregisters it from the bus exactly once.
pub struct Subscription {
    id: u64,
    filter: EventFilter,
    receiver: mpsc::Receiver<Notification>,
    bus: Option<Weak<dyn Unsubscriber>>,
}

impl Subscription {
    pub(crate) fn new(
        id: u64,
        filter: EventFilter,
        receiver: mpsc::Receiver<Notification>,
        bus: Weak<dyn Unsubscriber>,
    ) -> Self {
        Self {
            id,
            filter,
            receiver,
            bus: Some(bus),
        }
    }

    /// Subscription id, unique for the lifetime of the bus
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The filter this subscription was registered with
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// The topic this subscription listens on
    pub fn topic(&self) -> EventTopic {
        self.filter.topic()
    }

    /// Receive the next notification
    ///
    /// Returns `None` once the bus has closed or this handle was
    /// explicitly closed.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    /// Deregister now instead of at drop
    pub fn close(&mut self) {
        self.unregister_once();
        self.receiver.close();
    }

    fn unregister_once(&mut self) {
        if let Some(bus) = self.bus.take().and_then(|weak| weak.upgrade()) {
            bus.unregister(self.id, self.topic());
        }
    }
}

impl Stream for Subscription {
    type Item = Notification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unregister_once();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .finish()
    }
}
