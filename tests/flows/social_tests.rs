//! Friend Graph Flow Tests

use pretty_assertions::assert_eq;
use social_core::application::access::AuthContext;
use social_core::application::services::{SocialService, UpdateProfileInput};
use social_core::bus::{EventFilter, Notification};
use social_core::shared::error::AppError;

use crate::common::TestCore;

/// A sends a request to B, B accepts: friendship becomes mutual, the
/// request disappears from both sides, and a subscriber filtered on
/// B's acceptances sees exactly one notification carrying B.
#[tokio::test]
async fn test_friend_request_accept_end_to_end() {
    let t = TestCore::new();
    let (alice, alice_ctx) = t.register("alice").await;
    let (bob, bob_ctx) = t.register("bob").await;

    let mut accepted = t
        .core
        .bus
        .subscribe(EventFilter::FriendRequestAccepted { acceptor_id: bob.id })
        .unwrap();

    t.core
        .social
        .send_friend_request(&alice_ctx, bob.id)
        .await
        .unwrap();

    let bob_view = t.core.social.get_user(&alice_ctx, bob.id).await.unwrap();
    let alice_view = t.core.social.get_user(&bob_ctx, alice.id).await.unwrap();
    assert_eq!(bob_view.received_friend_requests, vec![alice.id]);
    assert_eq!(alice_view.sent_friend_requests, vec![bob.id]);

    t.core
        .social
        .respond_to_friend_request(&bob_ctx, alice.id, true)
        .await
        .unwrap();

    let alice_after = t.core.social.get_user(&bob_ctx, alice.id).await.unwrap();
    let bob_after = t.core.social.get_user(&alice_ctx, bob.id).await.unwrap();
    assert_eq!(alice_after.friends, vec![bob.id]);
    assert_eq!(bob_after.friends, vec![alice.id]);
    assert!(alice_after.sent_friend_requests.is_empty());
    assert!(bob_after.received_friend_requests.is_empty());

    match accepted.recv().await {
        Some(Notification::FriendRequestAccepted(acceptor)) => assert_eq!(acceptor.id, bob.id),
        other => panic!("expected acceptance notification, got {:?}", other),
    }
    let mut next = tokio_test::task::spawn(accepted.recv());
    tokio_test::assert_pending!(next.poll());
}

/// Declining clears the request from both sides without creating a
/// friendship or publishing an acceptance.
#[tokio::test]
async fn test_decline_clears_request_silently() {
    let t = TestCore::new();
    let (alice, alice_ctx) = t.register("alice").await;
    let (bob, bob_ctx) = t.register("bob").await;

    let mut accepted = t
        .core
        .bus
        .subscribe(EventFilter::FriendRequestAccepted { acceptor_id: bob.id })
        .unwrap();

    t.core
        .social
        .send_friend_request(&alice_ctx, bob.id)
        .await
        .unwrap();
    t.core
        .social
        .respond_to_friend_request(&bob_ctx, alice.id, false)
        .await
        .unwrap();

    let alice_after = t.core.social.get_user(&bob_ctx, alice.id).await.unwrap();
    let bob_after = t.core.social.get_user(&alice_ctx, bob.id).await.unwrap();
    assert!(alice_after.friends.is_empty());
    assert!(bob_after.friends.is_empty());
    assert!(alice_after.sent_friend_requests.is_empty());
    assert!(bob_after.received_friend_requests.is_empty());

    let mut next = tokio_test::task::spawn(accepted.recv());
    tokio_test::assert_pending!(next.poll());
}

/// A cancelled request leaves nothing to accept.
#[tokio::test]
async fn test_cancel_then_accept_not_found() {
    let t = TestCore::new();
    let (alice, alice_ctx) = t.register("alice").await;
    let (bob, bob_ctx) = t.register("bob").await;

    t.core
        .social
        .send_friend_request(&alice_ctx, bob.id)
        .await
        .unwrap();
    t.core
        .social
        .cancel_friend_request(&alice_ctx, bob.id)
        .await
        .unwrap();

    let bob_view = t.core.social.get_user(&alice_ctx, bob.id).await.unwrap();
    assert!(bob_view.received_friend_requests.is_empty());

    let err = t
        .core
        .social
        .respond_to_friend_request(&bob_ctx, alice.id, true)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

/// The request notification resolves to the sender's user record and
/// only reaches subscribers filtered on that sender.
#[tokio::test]
async fn test_friend_request_notification_carries_sender() {
    let t = TestCore::new();
    let (alice, alice_ctx) = t.register("alice").await;
    let (bob, _bob_ctx) = t.register("bob").await;
    let (charlie, _charlie_ctx) = t.register("charlie").await;

    let mut from_alice = t
        .core
        .bus
        .subscribe(EventFilter::FriendRequestReceived {
            from_user_id: alice.id,
        })
        .unwrap();
    let mut from_charlie = t
        .core
        .bus
        .subscribe(EventFilter::FriendRequestReceived {
            from_user_id: charlie.id,
        })
        .unwrap();

    t.core
        .social
        .send_friend_request(&alice_ctx, bob.id)
        .await
        .unwrap();

    match from_alice.recv().await {
        Some(Notification::FriendRequestReceived(sender)) => {
            assert_eq!(sender.id, alice.id);
            assert_eq!(sender.username, "alice");
        }
        other => panic!("expected request notification, got {:?}", other),
    }
    let mut other_sub = tokio_test::task::spawn(from_charlie.recv());
    tokio_test::assert_pending!(other_sub.poll());
}

/// Unfriending removes the edge from both users.
#[tokio::test]
async fn test_remove_friend_end_to_end() {
    let t = TestCore::new();
    let (alice, alice_ctx) = t.register("alice").await;
    let (bob, bob_ctx) = t.register("bob").await;

    t.core
        .social
        .send_friend_request(&alice_ctx, bob.id)
        .await
        .unwrap();
    t.core
        .social
        .respond_to_friend_request(&bob_ctx, alice.id, true)
        .await
        .unwrap();
    assert_eq!(
        t.core
            .social
            .get_friends(&alice_ctx)
            .await
            .unwrap()
            .iter()
            .map(|u| u.id)
            .collect::<Vec<_>>(),
        vec![bob.id]
    );

    t.core
        .social
        .remove_friend(&alice_ctx, bob.id)
        .await
        .unwrap();

    assert!(t.core.social.get_friends(&alice_ctx).await.unwrap().is_empty());
    assert!(t.core.social.get_friends(&bob_ctx).await.unwrap().is_empty());
}

/// Mutations demand a resolved identity; queries reject anonymous
/// callers the same way.
#[tokio::test]
async fn test_anonymous_caller_is_rejected() {
    let t = TestCore::new();
    let (bob, _bob_ctx) = t.register("bob").await;

    let anon = AuthContext::anonymous();
    let err = t
        .core
        .social
        .send_friend_request(&anon, bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated(_)));

    let err = t.core.social.get_users(&anon).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated(_)));
}

/// An unknown credential never produces a context.
#[tokio::test]
async fn test_unknown_credential_is_rejected() {
    let t = TestCore::new();

    let err = t.core.gate.context(Some("no-such-token")).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated(_)));
}

/// Profile updates touch only the supplied fields and are visible to
/// other users immediately.
#[tokio::test]
async fn test_update_profile_end_to_end() {
    let t = TestCore::new();
    let (alice, alice_ctx) = t.register("alice").await;
    let (_bob, bob_ctx) = t.register("bob").await;

    let updated = t
        .core
        .social
        .update_profile(
            &alice_ctx,
            UpdateProfileInput {
                bio: Some("hiking and espresso".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.bio.as_deref(), Some("hiking and espresso"));
    assert_eq!(updated.username, "alice");
    assert_eq!(updated.display_name, alice.display_name);

    let seen_by_bob = t.core.social.get_user(&bob_ctx, alice.id).await.unwrap();
    assert_eq!(seen_by_bob.bio.as_deref(), Some("hiking and espresso"));
}
