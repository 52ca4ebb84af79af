//! Deterministic in-process provider for tests and local development

use super::base::{Provider, SummarizeMessagesRequest, SummarizeResponse};
use crate::error::{LinkError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// [`Provider`] that returns a canned summary without any network I/O
///
/// Records every request it receives so tests can inspect what the handler
/// sent (for example whether anonymization was requested).
#[derive(Debug)]
pub struct FakeProvider {
    model: String,
    tokens_used: AtomicU32,
    calls: AtomicUsize,
    fail: AtomicBool,
    unhealthy: AtomicBool,
    requests: Mutex<Vec<SummarizeMessagesRequest>>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new("fake-model")
    }
}

impl FakeProvider {
    /// Create a fake provider reporting `model`
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            tokens_used: AtomicU32::new(120),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            unhealthy: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Set the token count reported for each summary
    pub fn set_tokens_used(&self, tokens: u32) {
        self.tokens_used.store(tokens, Ordering::SeqCst);
    }

    /// Make summarization calls fail
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Make health checks fail
    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    /// Number of `summarize_messages` calls so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<SummarizeMessagesRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Provider for FakeProvider {
    async fn summarize_messages(
        &self,
        request: SummarizeMessagesRequest,
    ) -> Result<SummarizeResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(LinkError::Provider("AI provider is unavailable (503)".to_string()).into());
        }

        Ok(SummarizeResponse {
            id: Uuid::new_v4(),
            conversation_id: request.conversation_id,
            summary: format!("Summary of {} messages", request.messages.len()),
            message_count: request.messages.len(),
            tokens_used: self.tokens_used.load(Ordering::SeqCst),
            model: self.model.clone(),
            processing_time: 0,
            cached_result: false,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        })
    }

    fn supported_models(&self) -> Vec<String> {
        vec![self.model.clone()]
    }

    fn default_model(&self) -> String {
        self.model.clone()
    }

    async fn health(&self) -> Result<()> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(LinkError::Provider("AI provider is unavailable (503)".to_string()).into());
        }
        Ok(())
    }
}
