//! Provider module for Link AI
//!
//! This module contains the AI provider abstraction, the Ollama
//! implementation and an in-process fake.

pub mod base;
pub mod fake;
pub mod ollama;

pub use base::{
    anonymize_messages, build_prompt, build_transcript, Message, Provider,
    SummarizeMessagesRequest, SummarizeResponse, TokenUsage,
};
#[cfg(test)]
pub use base::MockProvider;
pub use fake::FakeProvider;
pub use ollama::OllamaProvider;

use crate::config::AiConfig;
use crate::error::{LinkError, Result};
use std::sync::Arc;

/// Create a provider instance based on configuration
///
/// # Errors
///
/// Returns error if the provider type is unknown or initialization fails
pub fn create_provider(config: &AiConfig) -> Result<Arc<dyn Provider>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        other => Err(LinkError::Provider(format!("Unknown provider type: {}", other)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_provider() {
        let provider = create_provider(&AiConfig::default()).unwrap();
        assert_eq!(provider.default_model(), "llama3.2:latest");
    }

    #[test]
    fn test_create_unknown_provider_fails() {
        let config = AiConfig {
            provider: "openai".to_string(),
            ..AiConfig::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown provider type"));
    }
}
