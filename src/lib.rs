//! Link AI - consent-gated conversation summarization service
//!
//! This library provides the HTTP backend that summarizes recent chat
//! conversations with a language model, gated by per-user consent, with
//! per-user rate limiting, summary caching and an audit trail.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `server`: Router, middleware chain and request handlers
//! - `auth`: JWT validation and the authenticated user model
//! - `rate_limit`: Per-user token-bucket limiter
//! - `providers`: AI provider abstraction and the Ollama implementation
//! - `chat`: Conversation message source
//! - `privacy`: Consent records, audit log and privacy policy
//! - `cache`: Summary cache backends
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use link_ai::{cli::Cli, server, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Cli::default())?;
//!     config.validate()?;
//!     server::run(config).await
//! }
//! ```

pub mod auth;
pub mod cache;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod outbound;
pub mod privacy;
pub mod providers;
pub mod rate_limit;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use auth::{AuthenticatedUser, JwtValidator};
pub use config::Config;
pub use error::{LinkError, Result};
pub use server::{build_router, AppState};
