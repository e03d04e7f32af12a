//! Chat and Message Flow Tests

use pretty_assertions::assert_eq;
use social_core::application::services::{MessagingService, SendMessageInput, SocialService};
use social_core::bus::{EventFilter, Notification};
use social_core::domain::{Chat, DocRef, EntityStore, Message, Transaction};
use social_core::shared::error::AppError;

use crate::common::TestCore;

fn message(receiver_id: i64, text: &str) -> SendMessageInput {
    SendMessageInput {
        receiver_id,
        text: text.to_string(),
    }
}

/// Opening a chat registers it with both participants; messages append
/// in commit order and each delivery carries the chat as committed.
#[tokio::test]
async fn test_chat_and_messages_end_to_end() {
    let t = TestCore::new();
    let (alice, alice_ctx) = t.register("alice").await;
    let (bob, bob_ctx) = t.register("bob").await;

    let chat = t
        .core
        .messaging
        .create_chat(&alice_ctx, bob.id)
        .await
        .unwrap();

    let alice_record = t.core.social.get_user(&bob_ctx, alice.id).await.unwrap();
    let bob_record = t.core.social.get_user(&alice_ctx, bob.id).await.unwrap();
    assert_eq!(alice_record.chats, vec![chat.id]);
    assert_eq!(bob_record.chats, vec![chat.id]);

    let mut sub = t
        .core
        .bus
        .subscribe(EventFilter::MessageReceived { chat_id: chat.id })
        .unwrap();

    t.core
        .messaging
        .send_message(&alice_ctx, chat.id, message(bob.id, "one"))
        .await
        .unwrap();
    t.core
        .messaging
        .send_message(&bob_ctx, chat.id, message(alice.id, "two"))
        .await
        .unwrap();
    t.core
        .messaging
        .send_message(&alice_ctx, chat.id, message(bob.id, "three"))
        .await
        .unwrap();

    let messages = t
        .core
        .messaging
        .get_messages(&alice_ctx, chat.id)
        .await
        .unwrap();
    assert_eq!(
        messages.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(),
        vec!["one", "two", "three"]
    );

    let chat_after = t.core.messaging.get_chat(&alice_ctx, chat.id).await.unwrap();
    assert_eq!(chat_after.last_message.as_deref(), Some("three"));

    // Deliveries arrive in commit order, each with the state at commit
    for expected in ["one", "two", "three"] {
        match sub.recv().await {
            Some(Notification::MessageReceived(snapshot)) => {
                assert_eq!(snapshot.id, chat.id);
                assert_eq!(snapshot.last_message.as_deref(), Some(expected));
            }
            other => panic!("expected message notification, got {:?}", other),
        }
    }
    let mut next = tokio_test::task::spawn(sub.recv());
    tokio_test::assert_pending!(next.poll());
}

/// A second chat for the same pair is rejected regardless of which
/// side tries to open it.
#[tokio::test]
async fn test_duplicate_chat_rejected_in_both_orders() {
    let t = TestCore::new();
    let (alice, alice_ctx) = t.register("alice").await;
    let (bob, bob_ctx) = t.register("bob").await;

    t.core
        .messaging
        .create_chat(&alice_ctx, bob.id)
        .await
        .unwrap();

    let err = t
        .core
        .messaging
        .create_chat(&alice_ctx, bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = t
        .core
        .messaging
        .create_chat(&bob_ctx, alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    assert_eq!(t.core.messaging.get_chats(&alice_ctx).await.unwrap().len(), 1);
    assert_eq!(t.core.messaging.get_chats(&bob_ctx).await.unwrap().len(), 1);
}

/// Failed writes are atomic: when any operation in the batch cannot
/// apply, the inserted message is not visible afterwards.
#[tokio::test]
async fn test_failed_transaction_leaves_no_message() {
    let t = TestCore::new();
    let (alice, _alice_ctx) = t.register("alice").await;
    let (bob, _bob_ctx) = t.register("bob").await;

    let ghost = Message {
        id: 4242,
        chat: 999_999,
        sender: alice.id,
        receiver: bob.id,
        text: "ghost".into(),
        ..Default::default()
    };

    let mut tx = Transaction::new();
    tx.insert(&ghost).unwrap();
    tx.push(DocRef::chat(ghost.chat), Chat::MESSAGES, ghost.id, None);

    let err = t.core.store.run_transaction(tx).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(t.core.store.get::<Message>(ghost.id).await.unwrap().is_none());
}

/// Subscriptions are scoped to one chat.
#[tokio::test]
async fn test_deliveries_isolated_between_chats() {
    let t = TestCore::new();
    let (_alice, alice_ctx) = t.register("alice").await;
    let (bob, _bob_ctx) = t.register("bob").await;
    let (charlie, _charlie_ctx) = t.register("charlie").await;

    let with_bob = t
        .core
        .messaging
        .create_chat(&alice_ctx, bob.id)
        .await
        .unwrap();
    let with_charlie = t
        .core
        .messaging
        .create_chat(&alice_ctx, charlie.id)
        .await
        .unwrap();

    let mut sub = t
        .core
        .bus
        .subscribe(EventFilter::MessageReceived {
            chat_id: with_bob.id,
        })
        .unwrap();

    t.core
        .messaging
        .send_message(&alice_ctx, with_charlie.id, message(charlie.id, "elsewhere"))
        .await
        .unwrap();
    let mut quiet = tokio_test::task::spawn(sub.recv());
    tokio_test::assert_pending!(quiet.poll());
    drop(quiet);

    t.core
        .messaging
        .send_message(&alice_ctx, with_bob.id, message(bob.id, "here"))
        .await
        .unwrap();
    match sub.recv().await {
        Some(Notification::MessageReceived(snapshot)) => assert_eq!(snapshot.id, with_bob.id),
        other => panic!("expected message notification, got {:?}", other),
    }
}

/// Only the sender may delete a message, and deletion keeps the chat
/// summary untouched.
#[tokio::test]
async fn test_delete_message_flow() {
    let t = TestCore::new();
    let (_alice, alice_ctx) = t.register("alice").await;
    let (bob, bob_ctx) = t.register("bob").await;

    let chat = t
        .core
        .messaging
        .create_chat(&alice_ctx, bob.id)
        .await
        .unwrap();
    let first = t
        .core
        .messaging
        .send_message(&alice_ctx, chat.id, message(bob.id, "one"))
        .await
        .unwrap();
    let second = t
        .core
        .messaging
        .send_message(&alice_ctx, chat.id, message(bob.id, "two"))
        .await
        .unwrap();

    let err = t
        .core
        .messaging
        .delete_message(&bob_ctx, chat.id, first.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    t.core
        .messaging
        .delete_message(&alice_ctx, chat.id, first.id)
        .await
        .unwrap();

    let messages = t
        .core
        .messaging
        .get_messages(&bob_ctx, chat.id)
        .await
        .unwrap();
    assert_eq!(
        messages.iter().map(|m| m.id).collect::<Vec<_>>(),
        vec![second.id]
    );

    // Summary is not recomputed on deletion
    let chat_after = t.core.messaging.get_chat(&bob_ctx, chat.id).await.unwrap();
    assert_eq!(chat_after.last_message.as_deref(), Some("two"));
}

/// Non-participants cannot send into a chat.
#[tokio::test]
async fn test_outsider_cannot_send() {
    let t = TestCore::new();
    let (_alice, alice_ctx) = t.register("alice").await;
    let (bob, _bob_ctx) = t.register("bob").await;
    let (_charlie, charlie_ctx) = t.register("charlie").await;

    let chat = t
        .core
        .messaging
        .create_chat(&alice_ctx, bob.id)
        .await
        .unwrap();

    let err = t
        .core
        .messaging
        .send_message(&charlie_ctx, chat.id, message(bob.id, "me too"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let messages = t
        .core
        .messaging
        .get_messages(&alice_ctx, chat.id)
        .await
        .unwrap();
    assert!(messages.is_empty());
}
