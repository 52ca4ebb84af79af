//! Health, readiness and liveness probes

use crate::error::Result;
use crate::server::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

/// Outcome of a single dependency check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    /// `healthy` or `unhealthy`
    pub status: &'static str,
    /// Failure reason, when unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn healthy() -> Self {
        Self {
            status: "healthy",
            error: None,
        }
    }

    fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            status: "unhealthy",
            error: Some(error.into()),
        }
    }

    /// True when the dependency answered in time without error
    pub fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-dependency results
#[derive(Debug, Clone, Serialize)]
pub struct Checks {
    /// Privacy store database
    pub database: CheckResult,
    /// Summary cache
    pub cache: CheckResult,
    /// AI provider
    pub ai: CheckResult,
}

impl Checks {
    fn all_healthy(&self) -> bool {
        self.database.is_healthy() && self.cache.is_healthy() && self.ai.is_healthy()
    }
}

/// `GET /health` body
#[derive(Debug, Serialize)]
pub struct HealthReport {
    /// `healthy` or `unhealthy`
    pub status: &'static str,
    /// Dependency results
    pub checks: Checks,
    /// Service version
    pub version: &'static str,
    /// When the report was produced
    pub timestamp: DateTime<Utc>,
}

/// `GET /ready` body
#[derive(Debug, Serialize)]
pub struct ReadinessReport {
    /// True when every dependency is healthy
    pub ready: bool,
    /// Dependency results
    pub checks: Checks,
}

/// `GET /live` body
#[derive(Debug, Serialize)]
pub struct LivenessReport {
    /// Always true while the process serves requests
    pub alive: bool,
    /// Seconds since the state was built
    pub uptime_seconds: u64,
}

async fn probe<F>(name: &str, timeout: Duration, check: F) -> CheckResult
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(timeout, check).await {
        Ok(Ok(())) => CheckResult::healthy(),
        Ok(Err(e)) => {
            tracing::warn!(dependency = name, "Health check failed: {:#}", e);
            CheckResult::unhealthy(e.to_string())
        }
        Err(_) => {
            tracing::warn!(
                dependency = name,
                timeout_ms = timeout.as_millis() as u64,
                "Health check timed out"
            );
            CheckResult::unhealthy(format!("timed out after {}ms", timeout.as_millis()))
        }
    }
}

/// Run every dependency check concurrently
pub async fn run_checks(state: &AppState) -> Checks {
    let timeout = Duration::from_millis(state.config.health.check_timeout_ms);
    let (database, cache, ai) = tokio::join!(
        probe("database", timeout, state.privacy.health()),
        probe("cache", timeout, state.cache.health()),
        probe("ai", timeout, state.provider.health()),
    );
    Checks {
        database,
        cache,
        ai,
    }
}

fn status_for(healthy: bool) -> StatusCode {
    if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let checks = run_checks(&state).await;
    let healthy = checks.all_healthy();
    let report = HealthReport {
        status: if healthy { "healthy" } else { "unhealthy" },
        checks,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    };
    (status_for(healthy), Json(report))
}

/// `GET /ready`
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessReport>) {
    let checks = run_checks(&state).await;
    let ready = checks.all_healthy();
    (status_for(ready), Json(ReadinessReport { ready, checks }))
}

/// `GET /live`
pub async fn live(State(state): State<AppState>) -> Json<LivenessReport> {
    Json(LivenessReport {
        alive: true,
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkError;

    #[tokio::test]
    async fn test_probe_healthy() {
        let result = probe("db", Duration::from_millis(100), async { Ok(()) }).await;
        assert!(result.is_healthy());
        assert_eq!(result.status, "healthy");
    }

    #[tokio::test]
    async fn test_probe_error() {
        let result = probe("db", Duration::from_millis(100), async {
            Err(LinkError::Storage("locked".into()).into())
        })
        .await;
        assert!(!result.is_healthy());
        assert!(result.error.unwrap().contains("locked"));
    }

    #[tokio::test]
    async fn test_probe_timeout() {
        let result = probe("ai", Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert_eq!(result.status, "unhealthy");
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[test]
    fn test_unhealthy_serializes_error() {
        let value = serde_json::to_value(CheckResult::unhealthy("down")).unwrap();
        assert_eq!(value["status"], "unhealthy");
        assert_eq!(value["error"], "down");
        let value = serde_json::to_value(CheckResult::healthy()).unwrap();
        assert!(value.get("error").is_none());
    }
}
