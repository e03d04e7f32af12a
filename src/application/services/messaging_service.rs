//! Messaging Service
//!
//! Owns chat creation and transactional message append. A message and
//! its chat-summary update commit in one transaction, and a per-chat
//! async mutex spans commit+publish so delivery order within a chat
//! always matches commit order.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::Mutex;
use validator::Validate;

use crate::application::access::AuthContext;
use crate::bus::EventBus;
use crate::domain::{Chat, DocRef, DomainEvent, EntityStore, Message, Transaction, User};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Messaging service trait
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Open a chat between the caller and one other user
    async fn create_chat(&self, ctx: &AuthContext, with_user_id: i64) -> Result<Chat, AppError>;

    /// Append a message to a chat the caller participates in
    async fn send_message(&self, ctx: &AuthContext, chat_id: i64, input: SendMessageInput) -> Result<Message, AppError>;

    /// Delete a message the caller sent
    async fn delete_message(&self, ctx: &AuthContext, chat_id: i64, message_id: i64) -> Result<(), AppError>;

    /// The caller's chats
    async fn get_chats(&self, ctx: &AuthContext) -> Result<Vec<Chat>, AppError>;

    /// One chat by id
    async fn get_chat(&self, ctx: &AuthContext, chat_id: i64) -> Result<Chat, AppError>;

    /// A chat's messages, in commit order
    async fn get_messages(&self, ctx: &AuthContext, chat_id: i64) -> Result<Vec<Message>, AppError>;

    /// One message by id
    async fn get_message(&self, ctx: &AuthContext, message_id: i64) -> Result<Message, AppError>;
}

/// Send message request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessageInput {
    pub receiver_id: i64,

    #[validate(length(min = 1, max = 2000, message = "Message must be 1-2000 characters"))]
    pub text: String,
}

/// MessagingService implementation
pub struct MessagingServiceImpl<S: EntityStore> {
    store: Arc<S>,
    bus: Arc<EventBus<S>>,
    id_generator: Arc<SnowflakeGenerator>,
    /// Per-chat send serialization, so publish order equals commit order
    chat_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl<S: EntityStore> MessagingServiceImpl<S> {
    pub fn new(store: Arc<S>, bus: Arc<EventBus<S>>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            store,
            bus,
            id_generator,
            chat_locks: DashMap::new(),
        }
    }

    async fn load_chat(&self, chat_id: i64) -> Result<Chat, AppError> {
        self.store
            .get::<Chat>(chat_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Chat not found".to_string()))
    }

    async fn load_message(&self, message_id: i64) -> Result<Message, AppError> {
        self.store
            .get::<Message>(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Message not found".to_string()))
    }

    fn chat_lock(&self, chat_id: i64) -> Arc<Mutex<()>> {
        self.chat_locks
            .entry(chat_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl<S: EntityStore> MessagingService for MessagingServiceImpl<S> {
    async fn create_chat(&self, ctx: &AuthContext, with_user_id: i64) -> Result<Chat, AppError> {
        let caller = ctx.require()?.user_id;

        if caller == with_user_id {
            return Err(AppError::Conflict(
                "Cannot open a chat with yourself".to_string(),
            ));
        }

        let other: Option<User> = self.store.get(with_user_id).await?;
        if other.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        // Order-independent duplicate check; the pair_key unique index
        // closes the remaining race at commit time
        let existing = self
            .store
            .find(move |chat: &Chat| chat.is_pair(caller, with_user_id))
            .await?;
        if !existing.is_empty() {
            return Err(AppError::Conflict("Chat already exists".to_string()));
        }

        let now = Utc::now();
        let chat = Chat {
            id: self.id_generator.generate(),
            participants: [caller, with_user_id],
            pair_key: Chat::pair_key_for(caller, with_user_id),
            messages: Vec::new(),
            last_message: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = Transaction::new();
        tx.insert(&chat)?;
        tx.push(DocRef::user(caller), User::CHATS, chat.id, None);
        tx.push(DocRef::user(with_user_id), User::CHATS, chat.id, None);
        self.store.run_transaction(tx).await?;

        tracing::info!(chat_id = chat.id, a = caller, b = with_user_id, "Chat created");
        Ok(chat)
    }

    async fn send_message(&self, ctx: &AuthContext, chat_id: i64, input: SendMessageInput) -> Result<Message, AppError> {
        let caller = ctx.require()?.user_id;
        input.validate()?;

        // Hold the chat lock across commit and publish; concurrent sends
        // to the same chat deliver in commit order
        let lock = self.chat_lock(chat_id);
        let _guard = lock.lock().await;

        let chat = self.load_chat(chat_id).await?;
        if !chat.includes(caller) {
            return Err(AppError::Forbidden(
                "Not a participant in this chat".to_string(),
            ));
        }
        if chat.other_participant(caller) != Some(input.receiver_id) {
            return Err(AppError::Validation(
                "Receiver is not the other participant".to_string(),
            ));
        }

        let now = Utc::now();
        let message = Message {
            id: self.id_generator.generate(),
            chat: chat_id,
            sender: caller,
            receiver: input.receiver_id,
            text: input.text,
            created_at: now,
            updated_at: now,
        };

        let mut tx = Transaction::new();
        tx.insert(&message)?;
        tx.push(DocRef::chat(chat_id), Chat::MESSAGES, message.id, None);
        tx.update(
            DocRef::chat(chat_id),
            serde_json::json!({
                "last_message": message.text,
                "updated_at": now,
            }),
        );
        self.store.run_transaction(tx).await?;

        self.bus
            .publish(DomainEvent::MessageReceived {
                chat_id,
                message_id: message.id,
            })
            .await;

        tracing::debug!(message_id = message.id, chat_id, sender = caller, "Message sent");
        Ok(message)
    }

    async fn delete_message(&self, ctx: &AuthContext, chat_id: i64, message_id: i64) -> Result<(), AppError> {
        let caller = ctx.require()?.user_id;

        let message = self.load_message(message_id).await?;
        if message.chat != chat_id {
            return Err(AppError::NotFound(
                "Message not found in that chat".to_string(),
            ));
        }
        if message.sender != caller {
            return Err(AppError::Forbidden(
                "Only the sender can delete a message".to_string(),
            ));
        }

        // last_message intentionally keeps its value after deletion
        let mut tx = Transaction::new();
        tx.pull(DocRef::chat(chat_id), Chat::MESSAGES, message_id, None);
        tx.delete(DocRef::message(message_id));
        self.store.run_transaction(tx).await?;

        tracing::info!(message_id, chat_id, sender = caller, "Message deleted");
        Ok(())
    }

    async fn get_chats(&self, ctx: &AuthContext) -> Result<Vec<Chat>, AppError> {
        let caller = ctx.require()?.user_id;
        self.store.find(move |chat: &Chat| chat.includes(caller)).await
    }

    async fn get_chat(&self, ctx: &AuthContext, chat_id: i64) -> Result<Chat, AppError> {
        ctx.require()?;
        self.load_chat(chat_id).await
    }

    async fn get_messages(&self, ctx: &AuthContext, chat_id: i64) -> Result<Vec<Message>, AppError> {
        ctx.require()?;
        let chat = self.load_chat(chat_id).await?;

        let mut messages = Vec::with_capacity(chat.messages.len());
        for message_id in chat.messages {
            if let Some(message) = self.store.get::<Message>(message_id).await? {
                messages.push(message);
            }
        }
        Ok(messages)
    }

    async fn get_message(&self, ctx: &AuthContext, message_id: i64) -> Result<Message, AppError> {
        ctx.require()?;
        self.load_message(message_id).await
    }
}
