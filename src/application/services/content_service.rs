//! Content Service
//!
//! Owns posts, likes, and comments. Like/comment counters are paired
//! with their membership sets at the store level, so repeated likes
//! cannot drift `like_count` away from `|likes|`, and post deletion
//! cascades the post's comments in the same transaction.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use crate::application::access::AuthContext;
use crate::bus::EventBus;
use crate::domain::{Comment, DocRef, DomainEvent, EntityStore, Post, Transaction, User};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Content graph service trait
#[async_trait]
pub trait ContentService: Send + Sync {
    /// Create a post owned by the caller
    async fn create_post(&self, ctx: &AuthContext, input: CreatePostInput) -> Result<Post, AppError>;

    /// Delete a post the caller authored, cascading its comments
    async fn delete_post(&self, ctx: &AuthContext, post_id: i64) -> Result<(), AppError>;

    /// Add the caller to a post's likes
    async fn like_post(&self, ctx: &AuthContext, post_id: i64) -> Result<(), AppError>;

    /// Remove the caller from a post's likes
    async fn unlike_post(&self, ctx: &AuthContext, post_id: i64) -> Result<(), AppError>;

    /// Comment on a post
    async fn create_comment(&self, ctx: &AuthContext, post_id: i64, input: CreateCommentInput) -> Result<Comment, AppError>;

    /// Delete a comment the caller authored
    async fn delete_comment(&self, ctx: &AuthContext, comment_id: i64) -> Result<(), AppError>;

    /// All posts, newest first
    async fn get_feed(&self, ctx: &AuthContext) -> Result<Vec<Post>, AppError>;

    /// The caller's posts
    async fn get_my_posts(&self, ctx: &AuthContext) -> Result<Vec<Post>, AppError>;

    /// One post by id
    async fn get_post(&self, ctx: &AuthContext, post_id: i64) -> Result<Post, AppError>;

    /// Users who liked a post
    async fn get_likes(&self, ctx: &AuthContext, post_id: i64) -> Result<Vec<User>, AppError>;

    /// A post's comments, in comment order
    async fn get_comments(&self, ctx: &AuthContext, post_id: i64) -> Result<Vec<Comment>, AppError>;

    /// One comment by id
    async fn get_comment(&self, ctx: &AuthContext, comment_id: i64) -> Result<Comment, AppError>;
}

/// Create post request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePostInput {
    #[validate(length(min = 1, max = 2200, message = "Caption must be 1-2200 characters"))]
    pub caption: String,

    pub image_url: Option<String>,
}

/// Create comment request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCommentInput {
    #[validate(length(min = 1, max = 1000, message = "Comment must be 1-1000 characters"))]
    pub body: String,
}

/// ContentService implementation
pub struct ContentServiceImpl<S: EntityStore> {
    store: Arc<S>,
    bus: Arc<EventBus<S>>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<S: EntityStore> ContentServiceImpl<S> {
    pub fn new(store: Arc<S>, bus: Arc<EventBus<S>>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            store,
            bus,
            id_generator,
        }
    }

    async fn load_post(&self, post_id: i64) -> Result<Post, AppError> {
        self.store
            .get::<Post>(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }

    async fn load_comment(&self, comment_id: i64) -> Result<Comment, AppError> {
        self.store
            .get::<Comment>(comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
    }
}

#[async_trait]
impl<S: EntityStore> ContentService for ContentServiceImpl<S> {
    async fn create_post(&self, ctx: &AuthContext, input: CreatePostInput) -> Result<Post, AppError> {
        let caller = ctx.require()?.user_id;
        input.validate()?;

        let now = Utc::now();
        let post = Post {
            id: self.id_generator.generate(),
            author: caller,
            caption: input.caption,
            image_url: input.image_url,
            created_at: now,
            updated_at: now,
            ..Post::default()
        };

        let mut tx = Transaction::new();
        tx.insert(&post)?;
        tx.add_to_set(DocRef::user(caller), User::POSTS, post.id, Some(User::POST_COUNT));
        self.store.run_transaction(tx).await?;

        tracing::info!(post_id = post.id, author = caller, "Post created");
        Ok(post)
    }

    async fn delete_post(&self, ctx: &AuthContext, post_id: i64) -> Result<(), AppError> {
        let caller = ctx.require()?.user_id;
        let post = self.load_post(post_id).await?;

        if post.author != caller {
            return Err(AppError::Forbidden(
                "Only the author can delete a post".to_string(),
            ));
        }

        // Cascade every comment that still points at this post
        let comments = self
            .store
            .find(move |comment: &Comment| comment.post == post_id)
            .await?;

        let mut tx = Transaction::new();
        tx.pull(DocRef::user(caller), User::POSTS, post_id, Some(User::POST_COUNT));
        for comment in &comments {
            tx.delete(DocRef::comment(comment.id));
        }
        tx.delete(DocRef::post(post_id));
        self.store.run_transaction(tx).await?;

        tracing::info!(
            post_id,
            author = caller,
            cascaded_comments = comments.len(),
            "Post deleted"
        );
        Ok(())
    }

    async fn like_post(&self, ctx: &AuthContext, post_id: i64) -> Result<(), AppError> {
        let caller = ctx.require()?.user_id;
        self.load_post(post_id).await?;

        // Counter moves only when the like is new
        let changed = self
            .store
            .add_to_set(DocRef::post(post_id), Post::LIKES, caller, Some(Post::LIKE_COUNT))
            .await?;

        if changed {
            self.bus
                .publish(DomainEvent::PostLiked {
                    post_id,
                    user_id: caller,
                })
                .await;
            tracing::debug!(post_id, user_id = caller, "Post liked");
        }
        Ok(())
    }

    async fn unlike_post(&self, ctx: &AuthContext, post_id: i64) -> Result<(), AppError> {
        let caller = ctx.require()?.user_id;
        self.load_post(post_id).await?;

        self.store
            .remove_from_set(DocRef::post(post_id), Post::LIKES, caller, Some(Post::LIKE_COUNT))
            .await?;
        Ok(())
    }

    async fn create_comment(&self, ctx: &AuthContext, post_id: i64, input: CreateCommentInput) -> Result<Comment, AppError> {
        let caller = ctx.require()?.user_id;
        input.validate()?;

        self.load_post(post_id).await?;

        let now = Utc::now();
        let comment = Comment {
            id: self.id_generator.generate(),
            author: caller,
            post: post_id,
            body: input.body,
            created_at: now,
            updated_at: now,
        };

        let mut tx = Transaction::new();
        tx.insert(&comment)?;
        tx.push(DocRef::post(post_id), Post::COMMENTS, comment.id, Some(Post::COMMENT_COUNT));
        self.store.run_transaction(tx).await?;

        self.bus
            .publish(DomainEvent::PostCommented {
                post_id,
                comment_id: comment.id,
            })
            .await;

        tracing::info!(comment_id = comment.id, post_id, author = caller, "Comment created");
        Ok(comment)
    }

    async fn delete_comment(&self, ctx: &AuthContext, comment_id: i64) -> Result<(), AppError> {
        let caller = ctx.require()?.user_id;
        let comment = self.load_comment(comment_id).await?;

        // The comment author, not the post author, owns deletion
        if comment.author != caller {
            return Err(AppError::Forbidden(
                "Only the author can delete a comment".to_string(),
            ));
        }

        let post = self.store.get::<Post>(comment.post).await?;
        let Some(post) = post else {
            return Err(AppError::Invariant(format!(
                "Comment {} references missing post {}",
                comment_id, comment.post
            )));
        };

        let mut tx = Transaction::new();
        tx.pull(DocRef::post(post.id), Post::COMMENTS, comment_id, Some(Post::COMMENT_COUNT));
        tx.delete(DocRef::comment(comment_id));
        self.store.run_transaction(tx).await?;

        tracing::info!(comment_id, post_id = post.id, author = caller, "Comment deleted");
        Ok(())
    }

    async fn get_feed(&self, ctx: &AuthContext) -> Result<Vec<Post>, AppError> {
        ctx.require()?;

        let mut posts = self.store.list::<Post>().await?;
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts)
    }

    async fn get_my_posts(&self, ctx: &AuthContext) -> Result<Vec<Post>, AppError> {
        let caller = ctx.require()?.user_id;
        let author = self
            .store
            .get::<User>(caller)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", caller)))?;

        let mut posts = Vec::with_capacity(author.posts.len());
        for post_id in author.posts {
            if let Some(post) = self.store.get::<Post>(post_id).await? {
                posts.push(post);
            }
        }
        Ok(posts)
    }

    async fn get_post(&self, ctx: &AuthContext, post_id: i64) -> Result<Post, AppError> {
        ctx.require()?;
        self.load_post(post_id).await
    }

    async fn get_likes(&self, ctx: &AuthContext, post_id: i64) -> Result<Vec<User>, AppError> {
        ctx.require()?;
        let post = self.load_post(post_id).await?;

        let likes = post.likes;
        self.store.find(move |user: &User| likes.contains(&user.id)).await
    }

    async fn get_comments(&self, ctx: &AuthContext, post_id: i64) -> Result<Vec<Comment>, AppError> {
        ctx.require()?;
        let post = self.load_post(post_id).await?;

        // The post's sequence is the authoritative order
        let mut comments = Vec::with_capacity(post.comments.len());
        for comment_id in post.comments {
            if let Some(comment) = self.store.get::<Comment>(comment_id).await? {
                comments.push(comment);
            }
        }
        Ok(comments)
    }

    async fn get_comment(&self, ctx: &AuthContext, comment_id: i64) -> Result<Comment, AppError> {
        ctx.require()?;
        self.load_comment(comment_id).await
    }
}
