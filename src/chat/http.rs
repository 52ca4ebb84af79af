//! HTTP client for the chat service

use super::{ChatMessage, ChatStore};
use crate::config::ChatConfig;
use crate::error::{LinkError, Result};
use crate::outbound::{build_client, check_status, transport_error, Upstream};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

/// [`ChatStore`] backed by the chat service's REST API
///
/// Calls `GET {base_url}/api/v1/conversations/{id}/messages?limit=N`,
/// authenticating with the configured service token when one is set.
#[derive(Debug, Clone)]
pub struct HttpChatStore {
    client: Client,
    base_url: String,
    service_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesEnvelope {
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

impl HttpChatStore {
    /// Create a client for the configured chat service
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.timeout_seconds))?;

        tracing::info!("Initialized chat store client: base_url={}", config.base_url);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_token: config.service_token.clone(),
        })
    }

    fn messages_url(&self, conversation_id: Uuid) -> String {
        format!(
            "{}/api/v1/conversations/{}/messages",
            self.base_url, conversation_id
        )
    }
}

#[async_trait]
impl ChatStore for HttpChatStore {
    async fn get_recent_messages(
        &self,
        conversation_id: Uuid,
        limit: u32,
    ) -> Result<Vec<ChatMessage>> {
        let url = self.messages_url(conversation_id);
        tracing::debug!(%conversation_id, limit, "Fetching recent messages");

        let mut request = self.client.get(&url).query(&[("limit", limit)]);
        if let Some(token) = &self.service_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(Upstream::Chat, e))?;
        let response = check_status(Upstream::Chat, &conversation_id.to_string(), response).await?;

        let envelope: MessagesEnvelope = response.json().await.map_err(|e| {
            LinkError::Chat(format!("Failed to parse chat service response: {}", e))
        })?;

        let mut messages = envelope.messages;
        messages.sort_by_key(|m| m.created_at);
        if messages.len() > limit as usize {
            messages.drain(..messages.len() - limit as usize);
        }

        tracing::debug!(%conversation_id, count = messages.len(), "Fetched messages");
        Ok(messages)
    }
}
