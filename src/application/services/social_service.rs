//! Social Service
//!
//! Owns user records, the friend-request lifecycle, and friendship
//! symmetry. Every pair mutation runs as one store transaction so a
//! one-sided friendship or half-removed request is never observable.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use crate::application::access::AuthContext;
use crate::bus::EventBus;
use crate::domain::{DocRef, DomainEvent, EntityStore, Transaction, User};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Social graph service trait
#[async_trait]
pub trait SocialService: Send + Sync {
    /// Create a user record with an empty social graph
    async fn register_user(&self, input: RegisterUserInput) -> Result<User, AppError>;

    /// Update the caller's profile fields
    async fn update_profile(&self, ctx: &AuthContext, input: UpdateProfileInput) -> Result<User, AppError>;

    /// Send a friend request from the caller to another user
    async fn send_friend_request(&self, ctx: &AuthContext, to_user_id: i64) -> Result<(), AppError>;

    /// Withdraw a pending request the caller sent
    async fn cancel_friend_request(&self, ctx: &AuthContext, to_user_id: i64) -> Result<(), AppError>;

    /// Accept or decline a pending request addressed to the caller
    async fn respond_to_friend_request(&self, ctx: &AuthContext, requester_id: i64, accept: bool) -> Result<(), AppError>;

    /// Dissolve a friendship from either side
    async fn remove_friend(&self, ctx: &AuthContext, friend_id: i64) -> Result<(), AppError>;

    /// All users
    async fn get_users(&self, ctx: &AuthContext) -> Result<Vec<User>, AppError>;

    /// One user by id
    async fn get_user(&self, ctx: &AuthContext, user_id: i64) -> Result<User, AppError>;

    /// The caller's friends
    async fn get_friends(&self, ctx: &AuthContext) -> Result<Vec<User>, AppError>;

    /// Users with a pending request to the caller
    async fn get_received_friend_requests(&self, ctx: &AuthContext) -> Result<Vec<User>, AppError>;

    /// Users the caller has a pending request to
    async fn get_sent_friend_requests(&self, ctx: &AuthContext) -> Result<Vec<User>, AppError>;
}

/// Registration request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterUserInput {
    #[validate(length(min = 2, max = 32, message = "Username must be 2-32 characters"))]
    pub username: String,

    #[validate(length(max = 32, message = "Display name must be at most 32 characters"))]
    pub display_name: Option<String>,

    pub avatar_url: Option<String>,

    #[validate(length(max = 190, message = "Bio must be at most 190 characters"))]
    pub bio: Option<String>,
}

/// Profile update request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfileInput {
    #[validate(length(max = 32, message = "Display name must be at most 32 characters"))]
    pub display_name: Option<String>,

    pub avatar_url: Option<String>,

    #[validate(length(max = 190, message = "Bio must be at most 190 characters"))]
    pub bio: Option<String>,
}

/// SocialService implementation
pub struct SocialServiceImpl<S: EntityStore> {
    store: Arc<S>,
    bus: Arc<EventBus<S>>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<S: EntityStore> SocialServiceImpl<S> {
    pub fn new(store: Arc<S>, bus: Arc<EventBus<S>>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            store,
            bus,
            id_generator,
        }
    }

    async fn load_user(&self, user_id: i64) -> Result<User, AppError> {
        self.store
            .get::<User>(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Resolve a set of user ids into records, in id order
    async fn resolve_users(&self, ids: Vec<i64>) -> Result<Vec<User>, AppError> {
        self.store
            .find(move |user: &User| ids.contains(&user.id))
            .await
    }
}

#[async_trait]
impl<S: EntityStore> SocialService for SocialServiceImpl<S> {
    async fn register_user(&self, input: RegisterUserInput) -> Result<User, AppError> {
        input.validate()?;

        // Friendly precheck; the unique index closes the race
        let username = input.username.clone();
        let taken = self
            .store
            .find(move |user: &User| user.username == username)
            .await?;
        if !taken.is_empty() {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: self.id_generator.generate(),
            username: input.username,
            display_name: input.display_name,
            avatar_url: input.avatar_url,
            bio: input.bio,
            created_at: now,
            updated_at: now,
            ..User::default()
        };

        self.store.insert(&user).await?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    async fn update_profile(&self, ctx: &AuthContext, input: UpdateProfileInput) -> Result<User, AppError> {
        let caller = ctx.require()?.user_id;
        input.validate()?;

        let user = self.load_user(caller).await?;

        let mut fields = serde_json::Map::new();
        if let Some(display_name) = input.display_name {
            fields.insert("display_name".to_string(), serde_json::json!(display_name));
        }
        if let Some(avatar_url) = input.avatar_url {
            fields.insert("avatar_url".to_string(), serde_json::json!(avatar_url));
        }
        if let Some(bio) = input.bio {
            fields.insert("bio".to_string(), serde_json::json!(bio));
        }
        if fields.is_empty() {
            return Ok(user);
        }
        fields.insert("updated_at".to_string(), serde_json::json!(Utc::now()));

        self.store
            .update_fields(DocRef::user(caller), serde_json::Value::Object(fields))
            .await?;

        self.load_user(caller).await
    }

    async fn send_friend_request(&self, ctx: &AuthContext, to_user_id: i64) -> Result<(), AppError> {
        let caller = ctx.require()?.user_id;

        if caller == to_user_id {
            return Err(AppError::Validation(
                "Cannot send a friend request to yourself".to_string(),
            ));
        }

        // Target must exist before anything is written
        self.load_user(to_user_id).await?;
        let sender = self.load_user(caller).await?;

        if sender.is_friend(to_user_id) {
            return Err(AppError::Conflict("Already friends".to_string()));
        }
        if sender.has_request_to(to_user_id) {
            return Err(AppError::Conflict("Friend request already sent".to_string()));
        }

        let mut tx = Transaction::new();
        tx.add_to_set(DocRef::user(to_user_id), User::RECEIVED_FRIEND_REQUESTS, caller, None);
        tx.add_to_set(DocRef::user(caller), User::SENT_FRIEND_REQUESTS, to_user_id, None);
        self.store.run_transaction(tx).await?;

        self.bus
            .publish(DomainEvent::FriendRequestReceived {
                to_user_id,
                from_user_id: caller,
            })
            .await;

        tracing::info!(from = caller, to = to_user_id, "Friend request sent");
        Ok(())
    }

    async fn cancel_friend_request(&self, ctx: &AuthContext, to_user_id: i64) -> Result<(), AppError> {
        let caller = ctx.require()?.user_id;

        self.load_user(to_user_id).await?;

        // Pulling an absent request is a harmless no-op
        let mut tx = Transaction::new();
        tx.pull(DocRef::user(to_user_id), User::RECEIVED_FRIEND_REQUESTS, caller, None);
        tx.pull(DocRef::user(caller), User::SENT_FRIEND_REQUESTS, to_user_id, None);
        self.store.run_transaction(tx).await?;

        tracing::info!(from = caller, to = to_user_id, "Friend request cancelled");
        Ok(())
    }

    async fn respond_to_friend_request(&self, ctx: &AuthContext, requester_id: i64, accept: bool) -> Result<(), AppError> {
        let caller = ctx.require()?.user_id;

        self.load_user(requester_id).await?;
        let responder = self.load_user(caller).await?;

        // An accept must not mint a friendship that was never requested
        if !responder.has_request_from(requester_id) {
            return Err(AppError::NotFound(
                "No pending friend request from that user".to_string(),
            ));
        }

        // The pending request is removed from both sides whether or not
        // the responder accepts
        let mut tx = Transaction::new();
        tx.pull(DocRef::user(caller), User::RECEIVED_FRIEND_REQUESTS, requester_id, None);
        tx.pull(DocRef::user(requester_id), User::SENT_FRIEND_REQUESTS, caller, None);
        if accept {
            tx.add_to_set(DocRef::user(caller), User::FRIENDS, requester_id, None);
            tx.add_to_set(DocRef::user(requester_id), User::FRIENDS, caller, None);
        }
        self.store.run_transaction(tx).await?;

        if accept {
            self.bus
                .publish(DomainEvent::FriendRequestAccepted {
                    acceptor_id: caller,
                    requester_id,
                })
                .await;
        }

        tracing::info!(
            acceptor = caller,
            requester = requester_id,
            accept,
            "Friend request answered"
        );
        Ok(())
    }

    async fn remove_friend(&self, ctx: &AuthContext, friend_id: i64) -> Result<(), AppError> {
        let caller = ctx.require()?.user_id;

        self.load_user(friend_id).await?;

        let mut tx = Transaction::new();
        tx.pull(DocRef::user(friend_id), User::FRIENDS, caller, None);
        tx.pull(DocRef::user(caller), User::FRIENDS, friend_id, None);
        self.store.run_transaction(tx).await?;

        tracing::info!(user_id = caller, friend_id, "Friend removed");
        Ok(())
    }

    async fn get_users(&self, ctx: &AuthContext) -> Result<Vec<User>, AppError> {
        ctx.require()?;
        self.store.list::<User>().await
    }

    async fn get_user(&self, ctx: &AuthContext, user_id: i64) -> Result<User, AppError> {
        ctx.require()?;
        self.load_user(user_id).await
    }

    async fn get_friends(&self, ctx: &AuthContext) -> Result<Vec<User>, AppError> {
        let caller = ctx.require()?.user_id;
        let user = self.load_user(caller).await?;
        self.resolve_users(user.friends).await
    }

    async fn get_received_friend_requests(&self, ctx: &AuthContext) -> Result<Vec<User>, AppError> {
        let caller = ctx.require()?.user_id;
        let user = self.load_user(caller).await?;
        self.resolve_users(user.received_friend_requests).await
    }

    async fn get_sent_friend_requests(&self, ctx: &AuthContext) -> Result<Vec<User>, AppError> {
        let caller = ctx.require()?.user_id;
        let user = self.load_user(caller).await?;
        self.resolve_users(user.sent_friend_requests).await
    }
}
