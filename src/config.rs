//! Configuration management for Link AI
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{LinkError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for Link AI
///
/// Holds everything the server needs: listener settings, token validation,
/// throttling, collaborator endpoints and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// JWT validation configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Per-user rate limiting for the summarize endpoint
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Summary cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// AI provider configuration
    #[serde(default)]
    pub ai: AiConfig,
    /// Chat service client configuration
    #[serde(default)]
    pub chat: ChatConfig,
    /// Privacy/consent store configuration
    #[serde(default)]
    pub privacy: PrivacyConfig,
    /// Summarization request defaults
    #[serde(default)]
    pub summarization: SummarizationConfig,
    /// Health check configuration
    #[serde(default)]
    pub health: HealthConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,

    /// Port for the Prometheus exporter (only used with the `prometheus` feature)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            metrics_port: default_metrics_port(),
        }
    }
}

/// JWT validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify HS256 tokens
    #[serde(default)]
    pub jwt_secret: String,

    /// Expected `iss` claim; not checked when unset
    #[serde(default)]
    pub issuer: Option<String>,

    /// Clock skew tolerated when checking `exp` (seconds)
    #[serde(default = "default_leeway")]
    pub leeway_seconds: u64,

    /// Lifetime of development tokens minted by `link-ai token` (seconds)
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
}

fn default_leeway() -> u64 {
    30
}

fn default_token_ttl() -> u64 {
    3600
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: None,
            leeway_seconds: default_leeway(),
            token_ttl_seconds: default_token_ttl(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained requests per minute per user
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Bucket capacity (requests that may be made back to back)
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Idle time after which a user's bucket is dropped (seconds)
    #[serde(default = "default_bucket_ttl")]
    pub bucket_ttl_seconds: u64,

    /// Interval between eviction sweeps (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_requests_per_minute() -> u32 {
    5
}

fn default_burst() -> u32 {
    5
}

fn default_bucket_ttl() -> u64 {
    600
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            burst: default_burst(),
            bucket_ttl_seconds: default_bucket_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

/// Summary cache backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// Process-local map, lost on restart
    #[default]
    Memory,
    /// SQLite file shared across restarts
    Sqlite,
}

/// Summary cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Which backend stores summaries
    #[serde(default)]
    pub backend: CacheBackend,

    /// Database file for the SQLite backend (defaults to the data directory)
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,

    /// Lifetime of a cached summary (seconds)
    #[serde(default = "default_summary_ttl")]
    pub summary_ttl_seconds: u64,

    /// Interval between sweeps that delete expired summaries (seconds)
    #[serde(default = "default_cache_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_summary_ttl() -> u64 {
    3600
}

fn default_cache_sweep_interval() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            sqlite_path: None,
            summary_ttl_seconds: default_summary_ttl(),
            sweep_interval_seconds: default_cache_sweep_interval(),
        }
    }
}

/// AI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Provider type
    #[serde(default = "default_ai_provider")]
    pub provider: String,

    /// Provider host
    #[serde(default = "default_ai_host")]
    pub host: String,

    /// Model used for summaries
    #[serde(default = "default_ai_model")]
    pub model: String,

    /// Additional models callers may see as supported
    #[serde(default)]
    pub supported_models: Vec<String>,

    /// Request timeout for provider calls (seconds)
    #[serde(default = "default_ai_timeout")]
    pub timeout_seconds: u64,
}

fn default_ai_provider() -> String {
    "ollama".to_string()
}

fn default_ai_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ai_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ai_timeout() -> u64 {
    120
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_ai_provider(),
            host: default_ai_host(),
            model: default_ai_model(),
            supported_models: Vec::new(),
            timeout_seconds: default_ai_timeout(),
        }
    }
}

impl AiConfig {
    /// Every model the provider may be asked to use, default first
    pub fn all_supported_models(&self) -> Vec<String> {
        let mut models = vec![self.model.clone()];
        for model in &self.supported_models {
            if !models.contains(model) {
                models.push(model.clone());
            }
        }
        models
    }
}

/// Chat service client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the chat service
    #[serde(default = "default_chat_base_url")]
    pub base_url: String,

    /// Bearer token presented to the chat service
    #[serde(default)]
    pub service_token: Option<String>,

    /// Request timeout (seconds)
    #[serde(default = "default_chat_timeout")]
    pub timeout_seconds: u64,
}

fn default_chat_base_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_chat_timeout() -> u64 {
    10
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_base_url(),
            service_token: None,
            timeout_seconds: default_chat_timeout(),
        }
    }
}

/// Privacy/consent store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyConfig {
    /// SQLite database path (defaults to the data directory)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Active privacy policy version stamped on consent updates
    #[serde(default = "default_policy_version")]
    pub policy_version: String,

    /// Public URL of the active policy
    #[serde(default = "default_policy_url")]
    pub policy_url: String,

    /// Short human-readable policy summary
    #[serde(default = "default_policy_summary")]
    pub policy_summary: String,

    /// Date the active policy took effect (YYYY-MM-DD)
    #[serde(default = "default_policy_effective_date")]
    pub policy_effective_date: String,
}

fn default_policy_version() -> String {
    "1.0".to_string()
}

fn default_policy_url() -> String {
    "https://link.app/privacy/ai".to_string()
}

fn default_policy_summary() -> String {
    "Conversation messages are sent to an AI model only with your consent. \
     Summaries are cached for one hour and every access is audited."
        .to_string()
}

fn default_policy_effective_date() -> String {
    "2024-01-01".to_string()
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            policy_version: default_policy_version(),
            policy_url: default_policy_url(),
            policy_summary: default_policy_summary(),
            policy_effective_date: default_policy_effective_date(),
        }
    }
}

/// Summarization request defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationConfig {
    /// Messages fetched when the request omits `limit`
    #[serde(default = "default_message_limit")]
    pub default_message_limit: u32,

    /// Upper bound applied to requested limits
    #[serde(default = "default_max_message_limit")]
    pub max_message_limit: u32,
}

fn default_message_limit() -> u32 {
    15
}

fn default_max_message_limit() -> u32 {
    100
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            default_message_limit: default_message_limit(),
            max_message_limit: default_max_message_limit(),
        }
    }
}

/// Health check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Per-dependency timeout (milliseconds)
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,
}

fn default_check_timeout_ms() -> u64 {
    2000
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_timeout_ms: default_check_timeout_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,

    /// Optional file that receives a copy of every log line
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "link_ai=info,tower_http=warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LinkError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| LinkError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(host) = std::env::var("LINK_SERVER_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("LINK_SERVER_PORT") {
            match port.parse() {
                Ok(value) => self.server.port = value,
                Err(_) => tracing::warn!("Invalid LINK_SERVER_PORT: {}", port),
            }
        }

        if let Ok(secret) = std::env::var("LINK_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Ok(issuer) = std::env::var("LINK_JWT_ISSUER") {
            self.auth.issuer = Some(issuer);
        }

        if let Ok(rpm) = std::env::var("LINK_RATE_LIMIT_PER_MINUTE") {
            match rpm.parse() {
                Ok(value) => self.rate_limit.requests_per_minute = value,
                Err(_) => tracing::warn!("Invalid LINK_RATE_LIMIT_PER_MINUTE: {}", rpm),
            }
        }

        if let Ok(burst) = std::env::var("LINK_RATE_LIMIT_BURST") {
            match burst.parse() {
                Ok(value) => self.rate_limit.burst = value,
                Err(_) => tracing::warn!("Invalid LINK_RATE_LIMIT_BURST: {}", burst),
            }
        }

        if let Ok(ttl) = std::env::var("LINK_CACHE_TTL_SECONDS") {
            match ttl.parse() {
                Ok(value) => self.cache.summary_ttl_seconds = value,
                Err(_) => tracing::warn!("Invalid LINK_CACHE_TTL_SECONDS: {}", ttl),
            }
        }

        if let Ok(backend) = std::env::var("LINK_CACHE_BACKEND") {
            self.cache.backend = match backend.to_lowercase().as_str() {
                "memory" => CacheBackend::Memory,
                "sqlite" => CacheBackend::Sqlite,
                _ => {
                    tracing::warn!("Invalid cache backend: {}, using default", backend);
                    CacheBackend::default()
                }
            };
        }

        if let Ok(host) = std::env::var("LINK_AI_HOST") {
            self.ai.host = host;
        }

        if let Ok(model) = std::env::var("LINK_AI_MODEL") {
            self.ai.model = model;
        }

        if let Ok(base_url) = std::env::var("LINK_CHAT_BASE_URL") {
            self.chat.base_url = base_url;
        }

        if let Ok(token) = std::env::var("LINK_CHAT_SERVICE_TOKEN") {
            self.chat.service_token = Some(token);
        }

        if let Ok(db_path) = std::env::var("LINK_PRIVACY_DB") {
            self.privacy.database_path = Some(PathBuf::from(db_path));
        }

        if let Ok(level) = std::env::var("LINK_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json_logs) = std::env::var("LINK_JSON_LOGS") {
            match json_logs.parse::<bool>() {
                Ok(v) => self.logging.json_format = v,
                Err(_) => tracing::warn!("Invalid value for LINK_JSON_LOGS: {}", json_logs),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            self.logging.level = "link_ai=debug,tower_http=debug".to_string();
        }

        if let crate::cli::Commands::Serve { host, port } = &cli.command {
            if let Some(host) = host {
                self.server.host = host.clone();
            }
            if let Some(port) = port {
                self.server.port = *port;
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any value is out of range or a required field is unset
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(LinkError::Config(
                "auth.jwt_secret must be set (or LINK_JWT_SECRET)".to_string(),
            )
            .into());
        }

        if self.rate_limit.requests_per_minute == 0 {
            return Err(LinkError::Config(
                "rate_limit.requests_per_minute must be greater than 0".to_string(),
            )
            .into());
        }

        if self.rate_limit.burst == 0 {
            return Err(
                LinkError::Config("rate_limit.burst must be greater than 0".to_string()).into(),
            );
        }

        if self.rate_limit.sweep_interval_seconds == 0 {
            return Err(LinkError::Config(
                "rate_limit.sweep_interval_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.cache.summary_ttl_seconds == 0 {
            return Err(LinkError::Config(
                "cache.summary_ttl_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.cache.sweep_interval_seconds == 0 {
            return Err(LinkError::Config(
                "cache.sweep_interval_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        let valid_providers = ["ollama"];
        if !valid_providers.contains(&self.ai.provider.as_str()) {
            return Err(LinkError::Config(format!(
                "Invalid AI provider: {}. Must be one of: {}",
                self.ai.provider,
                valid_providers.join(", ")
            ))
            .into());
        }

        if self.ai.model.is_empty() {
            return Err(LinkError::Config("ai.model cannot be empty".to_string()).into());
        }

        url::Url::parse(&self.chat.base_url).map_err(|e| {
            LinkError::Config(format!("Invalid chat.base_url {}: {}", self.chat.base_url, e))
        })?;

        url::Url::parse(&self.ai.host)
            .map_err(|e| LinkError::Config(format!("Invalid ai.host {}: {}", self.ai.host, e)))?;

        if self.summarization.default_message_limit == 0 {
            return Err(LinkError::Config(
                "summarization.default_message_limit must be greater than 0".to_string(),
            )
            .into());
        }

        if self.summarization.max_message_limit < self.summarization.default_message_limit {
            return Err(LinkError::Config(
                "summarization.max_message_limit must be >= default_message_limit".to_string(),
            )
            .into());
        }

        if self.health.check_timeout_ms == 0 {
            return Err(LinkError::Config(
                "health.check_timeout_ms must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }

}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            ai: AiConfig::default(),
            chat: ChatConfig::default(),
            privacy: PrivacyConfig::default(),
            summarization: SummarizationConfig::default(),
            health: HealthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.auth.jwt_secret = "test-secret".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.rate_limit.requests_per_minute, 5);
        assert_eq!(config.cache.summary_ttl_seconds, 3600);
        assert_eq!(config.cache.sweep_interval_seconds, 300);
        assert_eq!(config.summarization.default_message_limit, 15);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
    }

    #[test]
    fn test_config_validation_success() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_cache_sweep_interval() {
        let mut config = valid_config();
        config.cache.sweep_interval_seconds = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.sweep_interval_seconds"));
    }

    #[test]
    fn test_config_validation_requires_secret() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("jwt_secret"));
    }

    #[test]
    fn test_config_validation_zero_rate_limit() {
        let mut config = valid_config();
        config.rate_limit.requests_per_minute = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.rate_limit.burst = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_provider() {
        let mut config = valid_config();
        config.ai.provider = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_chat_url() {
        let mut config = valid_config();
        config.chat.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_limits() {
        let mut config = valid_config();
        config.summarization.max_message_limit = 10;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.summarization.default_message_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
server:
  host: 127.0.0.1
  port: 9000
auth:
  jwt_secret: yaml-secret
  issuer: link-auth
rate_limit:
  requests_per_minute: 10
  burst: 3
cache:
  backend: sqlite
  sqlite_path: /tmp/link-cache.db
  summary_ttl_seconds: 120
ai:
  model: mistral:7b
  supported_models: [llama3.2:latest]
chat:
  base_url: http://chat.internal:8081
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.issuer.as_deref(), Some("link-auth"));
        assert_eq!(config.rate_limit.burst, 3);
        assert_eq!(config.cache.backend, CacheBackend::Sqlite);
        assert_eq!(config.cache.summary_ttl_seconds, 120);
        assert_eq!(config.ai.model, "mistral:7b");
        // Unspecified sections fall back to defaults
        assert_eq!(config.summarization.max_message_limit, 100);
        assert_eq!(config.health.check_timeout_ms, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_all_supported_models_dedupes_default() {
        let mut config = valid_config();
        config.ai.model = "a".to_string();
        config.ai.supported_models = vec!["b".to_string(), "a".to_string()];
        assert_eq!(config.ai.all_supported_models(), vec!["a", "b"]);
    }

    #[test]
    #[serial]
    fn test_load_nonexistent_file_uses_defaults() {
        let cli = crate::cli::Cli::default();
        let config = Config::load("/nonexistent/link-ai.yaml", &cli).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_cli_serve_overrides_host_and_port() {
        let mut cli = crate::cli::Cli::default();
        cli.command = crate::cli::Commands::Serve {
            host: Some("127.0.0.1".to_string()),
            port: Some(7000),
        };
        let mut config = valid_config();
        config.apply_cli_overrides(&cli);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    #[serial]
    fn test_apply_env_vars_overrides_fields() {
        std::env::set_var("LINK_JWT_SECRET", "env-secret");
        std::env::set_var("LINK_RATE_LIMIT_PER_MINUTE", "7");
        std::env::set_var("LINK_CACHE_BACKEND", "sqlite");
        std::env::set_var("LINK_SERVER_PORT", "not-a-number");

        let mut config = Config::default();
        config.apply_env_vars();

        assert_eq!(config.auth.jwt_secret, "env-secret");
        assert_eq!(config.rate_limit.requests_per_minute, 7);
        assert_eq!(config.cache.backend, CacheBackend::Sqlite);
        // Invalid values are ignored with a warning
        assert_eq!(config.server.port, 8080);

        std::env::remove_var("LINK_JWT_SECRET");
        std::env::remove_var("LINK_RATE_LIMIT_PER_MINUTE");
        std::env::remove_var("LINK_CACHE_BACKEND");
        std::env::remove_var("LINK_SERVER_PORT");
    }
}
