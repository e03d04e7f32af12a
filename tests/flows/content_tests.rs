//! Post and Comment Flow Tests

use pretty_assertions::assert_eq;
use social_core::application::services::{
    ContentService, CreateCommentInput, CreatePostInput, SocialService,
};
use social_core::bus::{EventFilter, Notification};
use social_core::domain::{Comment, EntityStore};
use social_core::shared::error::AppError;

use crate::common::TestCore;

fn post_input(caption: &str) -> CreatePostInput {
    CreatePostInput {
        caption: caption.to_string(),
        image_url: None,
    }
}

fn comment_input(body: &str) -> CreateCommentInput {
    CreateCommentInput {
        body: body.to_string(),
    }
}

/// Deleting a post removes it from the author's set, decrements the
/// author's counter by exactly one, and takes every comment with it.
#[tokio::test]
async fn test_delete_post_cascades_end_to_end() {
    let t = TestCore::new();
    let (alice, alice_ctx) = t.register("alice").await;
    let (_bob, bob_ctx) = t.register("bob").await;
    let (_charlie, charlie_ctx) = t.register("charlie").await;

    let post = t
        .core
        .content
        .create_post(&alice_ctx, post_input("lake at dawn"))
        .await
        .unwrap();

    let c1 = t
        .core
        .content
        .create_comment(&bob_ctx, post.id, comment_input("beautiful"))
        .await
        .unwrap();
    let c2 = t
        .core
        .content
        .create_comment(&charlie_ctx, post.id, comment_input("which lake?"))
        .await
        .unwrap();
    let c3 = t
        .core
        .content
        .create_comment(&bob_ctx, post.id, comment_input("going next week"))
        .await
        .unwrap();

    let loaded = t.core.content.get_post(&alice_ctx, post.id).await.unwrap();
    assert_eq!(loaded.comment_count, 3);
    let author = t.core.social.get_user(&bob_ctx, alice.id).await.unwrap();
    assert_eq!(author.post_count, 1);
    assert_eq!(author.posts, vec![post.id]);

    t.core.content.delete_post(&alice_ctx, post.id).await.unwrap();

    let author = t.core.social.get_user(&bob_ctx, alice.id).await.unwrap();
    assert_eq!(author.post_count, 0);
    assert!(author.posts.is_empty());

    let err = t.core.content.get_post(&alice_ctx, post.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    for comment_id in [c1.id, c2.id, c3.id] {
        let err = t
            .core
            .content
            .get_comment(&alice_ctx, comment_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
    assert!(t.core.store.list::<Comment>().await.unwrap().is_empty());
}

/// Only the author may delete a post.
#[tokio::test]
async fn test_delete_post_by_non_author_forbidden() {
    let t = TestCore::new();
    let (_alice, alice_ctx) = t.register("alice").await;
    let (_bob, bob_ctx) = t.register("bob").await;

    let post = t
        .core
        .content
        .create_post(&alice_ctx, post_input("mine"))
        .await
        .unwrap();

    let err = t.core.content.delete_post(&bob_ctx, post.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert!(t.core.content.get_post(&bob_ctx, post.id).await.is_ok());
}

/// like_count equals the size of the like set after any interleaving of
/// likes, repeat likes, and unlikes.
#[tokio::test]
async fn test_like_count_tracks_set_through_any_sequence() {
    let t = TestCore::new();
    let (_alice, alice_ctx) = t.register("alice").await;
    let (_bob, bob_ctx) = t.register("bob").await;
    let (_charlie, charlie_ctx) = t.register("charlie").await;

    let post = t
        .core
        .content
        .create_post(&alice_ctx, post_input("sunset"))
        .await
        .unwrap();

    let steps = vec![
        ("like", &bob_ctx),
        ("like", &charlie_ctx),
        ("like", &bob_ctx),   // repeat, no effect
        ("unlike", &bob_ctx),
        ("unlike", &bob_ctx), // repeat, no effect
        ("like", &alice_ctx),
        ("like", &bob_ctx),
    ];

    for (action, ctx) in steps {
        match action {
            "like" => t.core.content.like_post(ctx, post.id).await.unwrap(),
            _ => t.core.content.unlike_post(ctx, post.id).await.unwrap(),
        }
        let loaded = t.core.content.get_post(&alice_ctx, post.id).await.unwrap();
        assert_eq!(loaded.like_count as usize, loaded.likes.len());
    }

    let loaded = t.core.content.get_post(&alice_ctx, post.id).await.unwrap();
    assert_eq!(loaded.like_count, 3);
    let likers = t.core.content.get_likes(&alice_ctx, post.id).await.unwrap();
    assert_eq!(likers.len(), 3);
}

/// A subscription on one post receives every like of that post and no
/// likes of any other, each carrying the committed state.
#[tokio::test]
async fn test_post_liked_subscription_isolation() {
    let t = TestCore::new();
    let (_alice, alice_ctx) = t.register("alice").await;
    let (_bob, bob_ctx) = t.register("bob").await;
    let (_charlie, charlie_ctx) = t.register("charlie").await;

    let watched = t
        .core
        .content
        .create_post(&alice_ctx, post_input("watched"))
        .await
        .unwrap();
    let other = t
        .core
        .content
        .create_post(&alice_ctx, post_input("other"))
        .await
        .unwrap();

    let mut sub = t
        .core
        .bus
        .subscribe(EventFilter::PostLiked {
            post_id: watched.id,
        })
        .unwrap();

    t.core.content.like_post(&bob_ctx, other.id).await.unwrap();
    t.core.content.like_post(&bob_ctx, watched.id).await.unwrap();
    t.core.content.like_post(&charlie_ctx, other.id).await.unwrap();
    t.core
        .content
        .like_post(&charlie_ctx, watched.id)
        .await
        .unwrap();

    for expected_count in [1, 2] {
        match sub.recv().await {
            Some(Notification::PostLiked(snapshot)) => {
                assert_eq!(snapshot.id, watched.id);
                assert_eq!(snapshot.like_count, expected_count);
            }
            other => panic!("expected like notification, got {:?}", other),
        }
    }
    let mut next = tokio_test::task::spawn(sub.recv());
    tokio_test::assert_pending!(next.poll());
}

/// Commenting appends in order and notifies subscribers with the
/// updated post.
#[tokio::test]
async fn test_comment_flow_notifies_with_updated_post() {
    let t = TestCore::new();
    let (_alice, alice_ctx) = t.register("alice").await;
    let (_bob, bob_ctx) = t.register("bob").await;

    let post = t
        .core
        .content
        .create_post(&alice_ctx, post_input("ask me anything"))
        .await
        .unwrap();

    let mut sub = t
        .core
        .bus
        .subscribe(EventFilter::PostCommented { post_id: post.id })
        .unwrap();

    let first = t
        .core
        .content
        .create_comment(&bob_ctx, post.id, comment_input("first"))
        .await
        .unwrap();
    let second = t
        .core
        .content
        .create_comment(&alice_ctx, post.id, comment_input("second"))
        .await
        .unwrap();

    let comments = t
        .core
        .content
        .get_comments(&alice_ctx, post.id)
        .await
        .unwrap();
    assert_eq!(
        comments.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );

    match sub.recv().await {
        Some(Notification::PostCommented(snapshot)) => {
            assert_eq!(snapshot.comment_count, 1);
            assert_eq!(snapshot.comments, vec![first.id]);
        }
        other => panic!("expected comment notification, got {:?}", other),
    }
    match sub.recv().await {
        Some(Notification::PostCommented(snapshot)) => {
            assert_eq!(snapshot.comment_count, 2);
        }
        other => panic!("expected comment notification, got {:?}", other),
    }
}

/// The feed is global and newest-first; my_posts is the caller's slice.
#[tokio::test]
async fn test_feed_and_my_posts() {
    let t = TestCore::new();
    let (_alice, alice_ctx) = t.register("alice").await;
    let (_bob, bob_ctx) = t.register("bob").await;

    let p1 = t
        .core
        .content
        .create_post(&alice_ctx, post_input("one"))
        .await
        .unwrap();
    let p2 = t
        .core
        .content
        .create_post(&bob_ctx, post_input("two"))
        .await
        .unwrap();
    let p3 = t
        .core
        .content
        .create_post(&alice_ctx, post_input("three"))
        .await
        .unwrap();

    let feed = t.core.content.get_feed(&bob_ctx).await.unwrap();
    assert_eq!(
        feed.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![p3.id, p2.id, p1.id]
    );

    // my_posts follows the author's own sequence, oldest first
    let mine = t.core.content.get_my_posts(&alice_ctx).await.unwrap();
    assert_eq!(
        mine.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![p1.id, p3.id]
    );
}
