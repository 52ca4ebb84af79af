//! In-memory chat store for tests and local development
//!
//! Holds conversations in a map and counts how often it was queried, so
//! tests can assert that a code path never reached the chat service.

use super::{ChatMessage, ChatStore};
use crate::error::{LinkError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

/// [`ChatStore`] holding conversations in memory
#[derive(Debug, Default)]
pub struct InMemoryChatStore {
    conversations: RwLock<HashMap<Uuid, Vec<ChatMessage>>>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl InMemoryChatStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `count` generated messages to a conversation
    ///
    /// Senders alternate between two participants and timestamps ascend.
    pub fn seed_conversation(&self, conversation_id: Uuid, count: usize) {
        let base = Utc::now() - Duration::minutes(count as i64);
        let messages = (0..count).map(|i| {
            let (sender_id, sender_name) = if i % 2 == 0 {
                ("user-alice", "Alice")
            } else {
                ("user-bob", "Bob")
            };
            ChatMessage {
                id: Uuid::new_v4(),
                conversation_id,
                sender_id: sender_id.to_string(),
                sender_name: sender_name.to_string(),
                content: format!("message {}", i + 1),
                created_at: base + Duration::minutes(i as i64),
            }
        });
        self.insert_messages(conversation_id, messages);
    }

    /// Append specific messages to a conversation
    pub fn insert_messages(
        &self,
        conversation_id: Uuid,
        messages: impl IntoIterator<Item = ChatMessage>,
    ) {
        if let Ok(mut conversations) = self.conversations.write() {
            conversations
                .entry(conversation_id)
                .or_default()
                .extend(messages);
        }
    }

    /// Make subsequent calls fail with a chat service error
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of `get_recent_messages` calls so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn get_recent_messages(
        &self,
        conversation_id: Uuid,
        limit: u32,
    ) -> Result<Vec<ChatMessage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(LinkError::Chat("chat service is unavailable (503)".to_string()).into());
        }

        let conversations = self
            .conversations
            .read()
            .map_err(|_| LinkError::Chat("chat store lock poisoned".to_string()))?;

        let Some(messages) = conversations.get(&conversation_id) else {
            return Ok(Vec::new());
        };

        let mut messages = messages.clone();
        messages.sort_by_key(|m| m.created_at);
        let skip = messages.len().saturating_sub(limit as usize);
        Ok(messages.split_off(skip))
    }
}
