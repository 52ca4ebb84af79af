//! Service metrics
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! `prometheus` feature is enabled and [`init_metrics_exporter`] is called.
//!
//! # Metrics
//!
//! - `http_requests_total`: Counter of handled requests by method, route and status
//! - `http_request_duration_seconds`: Histogram of request latency by method and route
//! - `ai_summaries_total`: Counter of summaries served, labeled `cached`
//! - `ai_summary_tokens`: Histogram of tokens consumed by freshly generated summaries
//! - `rate_limit_rejections_total`: Counter of requests rejected by the rate limiter
//! - `ai_collaborator_errors_total`: Counter of collaborator failures by collaborator

use metrics::{histogram, increment_counter};
use std::time::Duration;

/// Record one completed HTTP request
pub fn record_http_request(method: &str, route: &str, status: u16, duration: Duration) {
    increment_counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    );
    histogram!(
        "http_request_duration_seconds",
        duration.as_secs_f64(),
        "method" => method.to_string(),
        "route" => route.to_string()
    );
}

/// Record a summary served to a client
pub fn record_summary(cached: bool, tokens_used: u32) {
    increment_counter!("ai_summaries_total", "cached" => cached.to_string());
    if !cached {
        histogram!("ai_summary_tokens", f64::from(tokens_used));
    }
}

/// Record a request rejected by the rate limiter
pub fn record_rate_limited() {
    increment_counter!("rate_limit_rejections_total");
}

/// Record a failure talking to a collaborator (`chat`, `ai`, `privacy`, `cache`)
pub fn record_collaborator_error(collaborator: &'static str) {
    increment_counter!("ai_collaborator_errors_total", "collaborator" => collaborator);
}

/// Install the Prometheus exporter listening on `port`.
///
/// Only has an effect when compiled with the `prometheus` feature; failures
/// are logged and otherwise ignored.
pub fn init_metrics_exporter(port: u16) {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new().with_http_listener(([0, 0, 0, 0], port));
        match builder.install() {
            Ok(()) => tracing::info!(port, "Prometheus exporter listening"),
            Err(e) => tracing::warn!("Failed to install Prometheus exporter: {}", e),
        }
    }
    #[cfg(not(feature = "prometheus"))]
    {
        tracing::debug!(port, "Metrics exporter disabled at compile time");
    }
}
