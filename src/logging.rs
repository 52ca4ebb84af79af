//! Structured logging setup
//!
//! Request and collaborator events are emitted through `tracing`. This module
//! installs the process-wide subscriber: JSON lines for log shippers or a
//! compact human format for local runs, optionally teed into a file.

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber described by `config`.
///
/// Events always go to STDOUT. When `file_path` is set the same events are
/// appended to that file, without ANSI colors.
///
/// # Arguments
///
/// * `config` - Logging section of the service configuration
///
/// # Returns
///
/// Returns `Ok(())` once the subscriber is installed
///
/// # Errors
///
/// Returns an error when the filter directive is invalid, the log file cannot
/// be opened, or a global subscriber is already installed.
///
/// # Examples
///
/// ```no_run
/// use link_ai::config::LoggingConfig;
/// use link_ai::logging::init_logging;
///
/// let config = LoggingConfig {
///     level: "link_ai=debug".to_string(),
///     json_format: true,
///     file_path: None,
/// };
///
/// init_logging(&config).unwrap();
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let log_file = config
        .file_path
        .as_deref()
        .map(open_log_file)
        .transpose()?;
    let registry = tracing_subscriber::registry().with(build_filter(&config.level)?);

    if config.json_format {
        let file_layer = log_file.map(|file| {
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(file)
        });
        registry
            .with(fmt::layer().json().with_current_span(true))
            .with(file_layer)
            .try_init()?;
    } else {
        let file_layer = log_file.map(|file| fmt::layer().with_ansi(false).with_writer(file));
        registry
            .with(fmt::layer().with_target(true))
            .with(file_layer)
            .try_init()?;
    }

    Ok(())
}

/// Open `path` for appending, creating it and its parent directory
///
/// # Arguments
///
/// * `path` - Log file location
///
/// # Returns
///
/// Returns a shareable handle usable as a `tracing` writer
fn open_log_file(path: &Path) -> Result<Arc<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok(Arc::new(file))
}

/// `RUST_LOG` wins over the configured directive
fn build_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log filter: {}", level)),
    }
}
