//! Base provider trait and common types for Link AI
//!
//! This module defines the Provider trait that AI backends implement, the
//! summarization request/response types exchanged with the handler layer,
//! and the prompt helpers shared by provider implementations.

use crate::chat::ChatMessage;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Instruction sent ahead of every transcript
pub const SUMMARY_SYSTEM_PROMPT: &str = "You summarize group chat conversations. \
Write a concise, neutral summary of the key topics, decisions and open questions \
in the transcript. Refer to people only by the names used in the transcript. \
Do not invent details that are not in the transcript.";

/// Message sent to a chat-completion style model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Creates a new system message
    ///
    /// # Examples
    ///
    /// ```
    /// use link_ai::providers::Message;
    ///
    /// let msg = Message::system("You summarize chats");
    /// assert_eq!(msg.role, "system");
    /// ```
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Creates a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Token usage reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,
    /// Tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Creates usage from prompt and completion counts
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Request to summarize a slice of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizeMessagesRequest {
    /// Conversation being summarized
    pub conversation_id: Uuid,
    /// User who asked for the summary
    pub user_id: String,
    /// Messages to summarize, oldest first
    pub messages: Vec<ChatMessage>,
    /// Replace sender names with pseudonyms before prompting
    pub anonymize: bool,
}

/// A summary produced by a provider, as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizeResponse {
    /// Summary identifier; stable across cache hits
    pub id: Uuid,
    /// Conversation that was summarized
    pub conversation_id: Uuid,
    /// Summary text
    pub summary: String,
    /// Number of messages fed to the model
    pub message_count: usize,
    /// Tokens consumed producing the summary
    pub tokens_used: u32,
    /// Model that produced the summary
    pub model: String,
    /// Wall-clock time to serve the request, in milliseconds
    pub processing_time: u64,
    /// True when served from the summary cache
    pub cached_result: bool,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// When the summary was generated
    pub created_at: DateTime<Utc>,
}

/// AI backend able to summarize conversations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Summarize the messages in `request`
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Provider` when the backend is unreachable, rejects
    /// the request, or returns an unusable response.
    async fn summarize_messages(
        &self,
        request: SummarizeMessagesRequest,
    ) -> Result<SummarizeResponse>;

    /// Models this provider can serve, default first
    fn supported_models(&self) -> Vec<String>;

    /// Model used when the caller does not choose one
    fn default_model(&self) -> String;

    /// Check that the backend is reachable
    async fn health(&self) -> Result<()>;
}

/// Replace sender names with stable `Participant N` pseudonyms
///
/// Numbering follows the order in which senders first appear, keyed by
/// sender id, so the same person always gets the same label within a request.
/// Mentions of a sender's display name inside message bodies are replaced too,
/// as whole words and preferring the longest name, so `Alice` is never
/// rewritten through a shorter sender name such as `Al`.
pub fn anonymize_messages(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut aliases: HashMap<&str, String> = HashMap::new();
    let mut name_aliases: HashMap<&str, String> = HashMap::new();
    for message in messages {
        if aliases.contains_key(message.sender_id.as_str()) {
            continue;
        }
        let alias = format!("Participant {}", aliases.len() + 1);
        let name = message.sender_name.trim();
        if !name.is_empty() {
            name_aliases.entry(name).or_insert_with(|| alias.clone());
        }
        aliases.insert(message.sender_id.as_str(), alias);
    }

    let mut names: Vec<&str> = name_aliases.keys().copied().collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let mentions = mention_pattern(&names);

    messages
        .iter()
        .map(|message| {
            let mut anonymized = message.clone();
            if let Some(alias) = aliases.get(message.sender_id.as_str()) {
                anonymized.sender_name = alias.clone();
            }
            anonymized.content = match &mentions {
                Some(pattern) => pattern
                    .replace_all(&message.content, |caps: &Captures| {
                        name_aliases
                            .get(&caps[0])
                            .cloned()
                            .unwrap_or_else(|| caps[0].to_string())
                    })
                    .into_owned(),
                None => names.iter().fold(message.content.clone(), |content, name| {
                    content.replace(name, &name_aliases[name])
                }),
            };
            anonymized
        })
        .collect()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// One alternation over every name, longest first, anchored on word edges
fn mention_pattern(names: &[&str]) -> Option<Regex> {
    if names.is_empty() {
        return None;
    }

    let alternation = names
        .iter()
        .map(|name| {
            let start = if name.starts_with(is_word_char) { r"\b" } else { "" };
            let end = if name.ends_with(is_word_char) { r"\b" } else { "" };
            format!("{}{}{}", start, regex::escape(name), end)
        })
        .collect::<Vec<_>>()
        .join("|");

    match Regex::new(&alternation) {
        Ok(pattern) => Some(pattern),
        Err(e) => {
            tracing::warn!("Falling back to plain name replacement: {}", e);
            None
        }
    }
}

/// Render messages as a plain-text transcript, one `Name: text` line each
pub fn build_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let name = if m.sender_name.trim().is_empty() {
                m.sender_id.as_str()
            } else {
                m.sender_name.as_str()
            };
            format!("{}: {}", name, m.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the prompt messages for a summarization request
pub fn build_prompt(request: &SummarizeMessagesRequest) -> Vec<Message> {
    let transcript = if request.anonymize {
        build_transcript(&anonymize_messages(&request.messages))
    } else {
        build_transcript(&request.messages)
    };

    vec![
        Message::system(SUMMARY_SYSTEM_PROMPT),
        Message::user(format!(
            "Summarize the following {} messages:\n\n{}",
            request.messages.len(),
            transcript
        )),
    ]
}
