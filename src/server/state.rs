//! Shared application state

use crate::auth::JwtValidator;
use crate::cache::{build_cache, SummaryCache};
use crate::chat::{create_chat_store, ChatStore};
use crate::config::Config;
use crate::error::Result;
use crate::privacy::{create_privacy_store, PrivacyStore};
use crate::providers::{create_provider, Provider};
use crate::rate_limit::RateLimiter;
use std::sync::Arc;
use std::time::Instant;

/// Everything a handler or middleware needs, cheap to clone per request
#[derive(Clone)]
pub struct AppState {
    /// Validated configuration
    pub config: Arc<Config>,
    /// Token validator
    pub jwt: Arc<JwtValidator>,
    /// Per-user limiter for the summarize endpoint
    pub rate_limiter: Arc<RateLimiter>,
    /// AI backend
    pub provider: Arc<dyn Provider>,
    /// Conversation history source
    pub chat: Arc<dyn ChatStore>,
    /// Consent and audit store
    pub privacy: Arc<dyn PrivacyStore>,
    /// Summary cache
    pub cache: Arc<dyn SummaryCache>,
    /// Process start, for liveness uptime
    pub started_at: Instant,
}

impl AppState {
    /// Assemble state from explicit collaborators
    pub fn new(
        config: Config,
        provider: Arc<dyn Provider>,
        chat: Arc<dyn ChatStore>,
        privacy: Arc<dyn PrivacyStore>,
        cache: Arc<dyn SummaryCache>,
    ) -> Self {
        Self {
            jwt: Arc::new(JwtValidator::from_config(&config.auth)),
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            config: Arc::new(config),
            provider,
            chat,
            privacy,
            cache,
            started_at: Instant::now(),
        }
    }

    /// Build the production collaborators described by `config`
    ///
    /// # Errors
    ///
    /// Returns error if any collaborator fails to initialize
    pub fn from_config(config: Config) -> Result<Self> {
        let provider = create_provider(&config.ai)?;
        let chat = create_chat_store(&config.chat)?;
        let privacy = create_privacy_store(&config.privacy)?;
        let cache = build_cache(&config.cache)?;
        Ok(Self::new(config, provider, chat, privacy, cache))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("jwt", &self.jwt)
            .field("rate_limiter", &self.rate_limiter)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}
