//! Bus Lifecycle Flow Tests

use pretty_assertions::assert_eq;
use social_core::application::services::{ContentService, CreatePostInput};
use social_core::bus::{EventFilter, Notification};
use social_core::config::Settings;
use social_core::domain::EventTopic;
use social_core::shared::error::AppError;

use crate::common::TestCore;

/// A subscriber that never drains its buffer loses deliveries, not
/// mutations: every like still commits.
#[tokio::test]
async fn test_slow_subscriber_drops_but_mutations_commit() {
    let mut settings = Settings::for_tests();
    settings.bus.delivery_buffer = 1;
    let t = TestCore::with_settings(settings);

    let (_alice, alice_ctx) = t.register("alice").await;
    let (_bob, bob_ctx) = t.register("bob").await;
    let (_charlie, charlie_ctx) = t.register("charlie").await;

    let post = t
        .core
        .content
        .create_post(
            &alice_ctx,
            CreatePostInput {
                caption: "crowded".into(),
                image_url: None,
            },
        )
        .await
        .unwrap();

    let mut sub = t
        .core
        .bus
        .subscribe(EventFilter::PostLiked { post_id: post.id })
        .unwrap();

    // Three likes without a single recv: buffer holds one, the rest drop
    t.core.content.like_post(&alice_ctx, post.id).await.unwrap();
    t.core.content.like_post(&bob_ctx, post.id).await.unwrap();
    t.core.content.like_post(&charlie_ctx, post.id).await.unwrap();

    let loaded = t.core.content.get_post(&alice_ctx, post.id).await.unwrap();
    assert_eq!(loaded.like_count, 3);

    match sub.recv().await {
        Some(Notification::PostLiked(snapshot)) => assert_eq!(snapshot.like_count, 1),
        other => panic!("expected like notification, got {:?}", other),
    }
    let mut next = tokio_test::task::spawn(sub.recv());
    tokio_test::assert_pending!(next.poll());
}

/// Shutdown disconnects subscribers and refuses new ones; mutations
/// keep committing with deliveries silently skipped.
#[tokio::test]
async fn test_shutdown_disconnects_subscribers() {
    let t = TestCore::new();
    let (_alice, alice_ctx) = t.register("alice").await;

    let post = t
        .core
        .content
        .create_post(
            &alice_ctx,
            CreatePostInput {
                caption: "last light".into(),
                image_url: None,
            },
        )
        .await
        .unwrap();

    let mut sub = t
        .core
        .bus
        .subscribe(EventFilter::PostLiked { post_id: post.id })
        .unwrap();

    t.core.shutdown();

    assert!(sub.recv().await.is_none());
    let err = t
        .core
        .bus
        .subscribe(EventFilter::PostLiked { post_id: post.id })
        .unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)));

    t.core.content.like_post(&alice_ctx, post.id).await.unwrap();
    let loaded = t.core.content.get_post(&alice_ctx, post.id).await.unwrap();
    assert_eq!(loaded.like_count, 1);
}

/// Dropping a subscription handle deregisters it from its topic.
#[tokio::test]
async fn test_dropped_subscription_unregisters() {
    let t = TestCore::new();

    let sub = t
        .core
        .bus
        .subscribe(EventFilter::MessageReceived { chat_id: 7 })
        .unwrap();
    assert_eq!(t.core.bus.subscriber_count(EventTopic::MessageReceived), 1);

    drop(sub);
    assert_eq!(t.core.bus.subscriber_count(EventTopic::MessageReceived), 0);
}
