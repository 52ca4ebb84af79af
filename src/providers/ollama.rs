//! Ollama provider implementation
//!
//! Summaries are produced with a single non-streaming call to Ollama's
//! `/api/chat` endpoint. Reachability is checked through `/api/tags`.

use super::base::{
    build_prompt, Message, Provider, SummarizeMessagesRequest, SummarizeResponse, TokenUsage,
};
use crate::config::AiConfig;
use crate::error::{LinkError, Result};
use crate::outbound::{build_client, check_status, transport_error, Upstream};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Ollama provider
///
/// # Examples
///
/// ```
/// use link_ai::config::AiConfig;
/// use link_ai::providers::{OllamaProvider, Provider};
///
/// let provider = OllamaProvider::new(&AiConfig::default()).unwrap();
/// assert_eq!(provider.default_model(), "llama3.2:latest");
/// ```
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    host: String,
    model: String,
    supported_models: Vec<String>,
}

/// Request structure for the Ollama chat API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
}

/// Message structure returned by Ollama
#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

/// Response structure from the Ollama chat API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

impl OllamaProvider {
    /// Create a new Ollama provider instance
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: &AiConfig) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.timeout_seconds))?;

        tracing::info!(
            "Initialized Ollama provider: host={}, model={}",
            config.host,
            config.model
        );

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            supported_models: config.all_supported_models(),
        })
    }

    /// Get the configured Ollama host
    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn summarize_messages(
        &self,
        request: SummarizeMessagesRequest,
    ) -> Result<SummarizeResponse> {
        let started = Instant::now();
        let url = format!("{}/api/chat", self.host);
        let ollama_request = OllamaRequest {
            model: self.model.clone(),
            messages: build_prompt(&request),
            stream: false,
        };

        tracing::debug!(
            conversation_id = %request.conversation_id,
            messages = request.messages.len(),
            anonymize = request.anonymize,
            "Sending Ollama summarization request"
        );

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| transport_error(Upstream::Ai, e))?;
        let response = check_status(Upstream::Ai, &self.model, response).await?;

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama response: {}", e);
            LinkError::Provider(format!("Failed to parse Ollama response: {}", e))
        })?;

        let summary = ollama_response.message.content.trim().to_string();
        if summary.is_empty() {
            return Err(LinkError::Provider("Ollama returned an empty summary".to_string()).into());
        }

        let usage = TokenUsage::new(ollama_response.prompt_eval_count, ollama_response.eval_count);
        tracing::debug!(
            done = ollama_response.done,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Ollama response received"
        );

        let mut metadata = HashMap::new();
        metadata.insert(
            "prompt_tokens".to_string(),
            serde_json::json!(usage.prompt_tokens),
        );
        metadata.insert(
            "completion_tokens".to_string(),
            serde_json::json!(usage.completion_tokens),
        );

        Ok(SummarizeResponse {
            id: Uuid::new_v4(),
            conversation_id: request.conversation_id,
            summary,
            message_count: request.messages.len(),
            tokens_used: usage.total_tokens,
            model: ollama_response.model.unwrap_or_else(|| self.model.clone()),
            processing_time: started.elapsed().as_millis() as u64,
            cached_result: false,
            metadata,
            created_at: Utc::now(),
        })
    }

    fn supported_models(&self) -> Vec<String> {
        self.supported_models.clone()
    }

    fn default_model(&self) -> String {
        self.model.clone()
    }

    async fn health(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.host);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(Upstream::Ai, e))?;
        check_status(Upstream::Ai, "tags", response).await?;
        Ok(())
    }
}
