//! Event Bus
//!
//! In-process publish/subscribe router. Subscriptions register a
//! topic-specific filter; publishes resolve the event into the full
//! entity once and fan it out to every matching subscriber over
//! bounded per-subscription channels.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::subscription::{EventFilter, Notification, Subscription, Unsubscriber};
use crate::domain::{Chat, DomainEvent, EntityStore, EventTopic, Post, User};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Registered sender half of one subscription
struct SubscriberSlot {
    filter: EventFilter,
    sender: mpsc::Sender<Notification>,
}

/// Publish/subscribe router over all event topics
///
/// Delivery is at-most-once per subscription per publish: sends are
/// non-blocking and a full buffer drops the notification for that
/// subscriber only.
pub struct EventBus<S: EntityStore> {
    store: Arc<S>,
    /// Per-subscription channel capacity
    capacity: usize,
    next_id: AtomicU64,
    /// Slots by subscription id
    subscriptions: DashMap<u64, SubscriberSlot>,
    /// Subscription ids by topic, for publish fan-out
    topic_index: DashMap<EventTopic, Vec<u64>>,
    closed: AtomicBool,
}

impl<S: EntityStore> EventBus<S> {
    pub fn new(store: Arc<S>, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            subscriptions: DashMap::new(),
            topic_index: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a filtered subscription
    ///
    /// Fails with `Unavailable` once the bus has been closed.
    pub fn subscribe(self: &Arc<Self>, filter: EventFilter) -> Result<Subscription, AppError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AppError::Unavailable("Event bus is closed".to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let topic = filter.topic();
        let (sender, receiver) = mpsc::channel(self.capacity);

        self.subscriptions.insert(id, SubscriberSlot { filter, sender });
        self.topic_index.entry(topic).or_default().push(id);
        metrics::record_subscription_opened(topic.as_str());

        tracing::debug!(subscription_id = id, topic = %topic, "Subscription registered");

        let unsubscriber: Arc<dyn Unsubscriber> = self.clone();
        Ok(Subscription::new(
            id,
            filter,
            receiver,
            Arc::downgrade(&unsubscriber),
        ))
    }

    /// Publish a committed event
    ///
    /// Resolves the payload entity through the store once, then delivers
    /// a clone to every live subscription whose filter matches. Failures
    /// here are logged and counted; they never propagate back into the
    /// mutation that produced the event.
    pub async fn publish(&self, event: DomainEvent) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        let topic = event.topic();
        metrics::record_event_published(topic.as_str());

        // Snapshot the matching subscriber set before resolving, so a
        // registration racing with this publish sees either all deliveries
        // or none of them.
        let targets = self.matching_targets(topic, &event);
        if targets.is_empty() {
            return;
        }

        let notification = match self.resolve(&event).await {
            Ok(Some(notification)) => notification,
            Ok(None) => {
                tracing::warn!(topic = %topic, ?event, "Event entity no longer exists, skipping fan-out");
                return;
            }
            Err(error) => {
                tracing::error!(topic = %topic, %error, "Failed to resolve event entity");
                return;
            }
        };

        for (subscription_id, sender) in targets {
            match sender.try_send(notification.clone()) {
                Ok(()) => metrics::record_event_delivered(topic.as_str()),
                Err(_) => {
                    metrics::record_event_dropped(topic.as_str());
                    tracing::warn!(
                        subscription_id,
                        topic = %topic,
                        "Delivery dropped, subscriber buffer full or gone"
                    );
                }
            }
        }
    }

    /// Close the bus: disconnect all subscribers, reject new registrations
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.topic_index.clear();
        // Dropping the senders ends every receiver stream
        self.subscriptions.retain(|_, slot| {
            metrics::record_subscription_closed(slot.filter.topic().as_str());
            false
        });

        tracing::info!("Event bus closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions on one topic
    pub fn subscriber_count(&self, topic: EventTopic) -> usize {
        self.topic_index
            .get(&topic)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    fn matching_targets(
        &self,
        topic: EventTopic,
        event: &DomainEvent,
    ) -> Vec<(u64, mpsc::Sender<Notification>)> {
        let ids = match self.topic_index.get(&topic) {
            Some(ids) => ids.clone(),
            None => return Vec::new(),
        };

        ids.iter()
            .filter_map(|id| {
                self.subscriptions.get(id).and_then(|slot| {
                    slot.filter
                        .matches(event)
                        .then(|| (*id, slot.sender.clone()))
                })
            })
            .collect()
    }

    async fn resolve(&self, event: &DomainEvent) -> Result<Option<Notification>, AppError> {
        let notification = match *event {
            DomainEvent::PostLiked { post_id, .. } => self
                .store
                .get::<Post>(post_id)
                .await?
                .map(Notification::PostLiked),
            DomainEvent::PostCommented { post_id, .. } => self
                .store
                .get::<Post>(post_id)
                .await?
                .map(Notification::PostCommented),
            DomainEvent::FriendRequestReceived { from_user_id, .. } => self
                .store
                .get::<User>(from_user_id)
                .await?
                .map(Notification::FriendRequestReceived),
            DomainEvent::FriendRequestAccepted { acceptor_id, .. } => self
                .store
                .get::<User>(acceptor_id)
                .await?
                .map(Notification::FriendRequestAccepted),
            DomainEvent::MessageReceived { chat_id, .. } => self
                .store
                .get::<Chat>(chat_id)
                .await?
                .map(Notification::MessageReceived),
        };

        Ok(notification)
    }
}

impl<S: EntityStore> Unsubscriber for EventBus<S> {
    fn unregister(&self, id: u64, topic: EventTopic) {
        if self.subscriptions.remove(&id).is_some() {
            if let Some(mut ids) = self.topic_index.get_mut(&topic) {
                ids.retain(|existing| *existing != id);
            }
            metrics::record_subscription_closed(topic.as_str());
            tracing::debug!(subscription_id = id, topic = %topic, "Subscription unregistered");
        }
    }
}
