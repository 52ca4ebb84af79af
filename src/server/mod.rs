//! HTTP surface of the service
//!
//! [`build_router`] wires handlers and middleware around an [`AppState`];
//! [`run`] binds the listener and serves until Ctrl-C or SIGTERM.

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod state;

pub use response::ApiError;
pub use state::AppState;

use crate::cache::spawn_expiry_sweeper;
use crate::config::Config;
use crate::error::{LinkError, Result};
use crate::metrics;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post};
use axum::Router;
use handlers::{consent, health, models, summarize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;

/// Build the application router
///
/// Probes are public. Everything under `/api/v1` requires a bearer token, and
/// the summarize endpoint is additionally rate limited per user.
pub fn build_router(state: AppState) -> Router {
    let summarize_routes = Router::new()
        .route("/api/v1/ai/summarize", post(summarize::summarize))
        .route_layer(from_fn_with_state(state.clone(), middleware::rate_limit));

    let api = Router::new()
        .route(
            "/api/v1/ai/consent",
            get(consent::get_consent)
                .put(consent::update_consent)
                .delete(consent::revoke_consent),
        )
        .route("/api/v1/ai/consent/audit", get(consent::list_audit_logs))
        .route("/api/v1/ai/consent/policy", get(consent::get_policy))
        .route("/api/v1/ai/models", get(models::list_models))
        .route(
            "/api/v1/ai/summaries/:conversation_id",
            delete(models::invalidate_summaries),
        )
        .merge(summarize_routes)
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/live", get(health::live))
        .merge(api)
        .fallback(handlers::not_found)
        .layer(from_fn(middleware::log_requests))
        .layer(CatchPanicLayer::custom(middleware::handle_panic))
        .with_state(state)
}

/// Serve the API described by `config` until a shutdown signal arrives
///
/// # Errors
///
/// Returns error if a collaborator cannot be built or the listener cannot bind
pub async fn run(config: Config) -> Result<()> {
    let state = AppState::from_config(config)?;
    serve(state).await
}

/// Serve an already-assembled state
///
/// # Errors
///
/// Returns error if the listener cannot bind or the server fails
pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let shutdown = CancellationToken::new();

    let sweeper = state.rate_limiter.clone().spawn_sweeper(
        Duration::from_secs(state.config.rate_limit.sweep_interval_seconds),
        shutdown.clone(),
    );
    let cache_sweeper = spawn_expiry_sweeper(
        state.cache.clone(),
        Duration::from_secs(state.config.cache.sweep_interval_seconds),
        shutdown.clone(),
    );

    metrics::init_metrics_exporter(state.config.server.metrics_port);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| LinkError::Config(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(
        address = %addr,
        model = %state.config.ai.model,
        cache = ?state.config.cache.backend,
        "Link AI listening"
    );

    let app = build_router(state);
    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!("Rate limiter sweeper ended abnormally: {}", e);
    }
    if let Err(e) = cache_sweeper.await {
        tracing::warn!("Summary cache sweeper ended abnormally: {}", e);
    }
    tracing::info!("Server stopped");

    result?;
    Ok(())
}

/// Resolve on Ctrl-C, SIGTERM or an external cancel of `token`
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
        _ = token.cancelled() => tracing::info!("Shutdown requested"),
    }
}
