//! Chat message store
//!
//! The summarizer never owns conversation data; it reads recent messages
//! from the chat service through the [`ChatStore`] trait.

pub mod fake;
pub mod http;

pub use fake::InMemoryChatStore;
pub use http::HttpChatStore;

use crate::config::ChatConfig;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A single chat message as stored by the chat service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message identifier
    pub id: Uuid,
    /// Conversation the message belongs to
    pub conversation_id: Uuid,
    /// Author's user id
    pub sender_id: String,
    /// Author's display name
    #[serde(default)]
    pub sender_name: String,
    /// Message text
    pub content: String,
    /// When the message was sent
    pub created_at: DateTime<Utc>,
}

/// Read access to conversation history
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Fetch up to `limit` of the most recent messages, oldest first
    ///
    /// # Errors
    ///
    /// Returns `LinkError::ConversationNotFound` when the conversation does not
    /// exist, or `LinkError::Chat` for transport and decoding failures.
    async fn get_recent_messages(
        &self,
        conversation_id: Uuid,
        limit: u32,
    ) -> Result<Vec<ChatMessage>>;
}

/// Build the chat store described by `config`
pub fn create_chat_store(config: &ChatConfig) -> Result<Arc<dyn ChatStore>> {
    Ok(Arc::new(HttpChatStore::new(config)?))
}
