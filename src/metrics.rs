//! Prometheus metrics for request latency and record activity.
//!
//! This module provides:
//! - HTTP request latency, labelled by endpoint, method and status
//! - Counters for grade writes, issued tokens and rejected credentials

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::debug;

// === Metric Name Constants ===

/// HTTP request latency metric name.
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_latency_ms";
/// Grades created counter metric name.
pub const METRIC_GRADES_CREATED: &str = "grades_created_total";
/// Grades updated counter metric name.
pub const METRIC_GRADES_UPDATED: &str = "grades_updated_total";
/// Grades deleted counter metric name.
pub const METRIC_GRADES_DELETED: &str = "grades_deleted_total";
/// Rejected credentials counter metric name.
pub const METRIC_AUTH_FAILURES: &str = "auth_failures_total";
/// Token pairs and refreshed access tokens counter metric name.
pub const METRIC_TOKENS_ISSUED: &str = "tokens_issued_total";

/// Install the global Prometheus recorder and register metric descriptions.
///
/// Call once at startup; the returned handle renders the exposition text.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    init_metrics();
    Ok(handle)
}

/// Initialize all metric descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "HTTP request latency in milliseconds"
    );

    describe_counter!(METRIC_GRADES_CREATED, "Total number of grades created");
    describe_counter!(METRIC_GRADES_UPDATED, "Total number of grades updated");
    describe_counter!(METRIC_GRADES_DELETED, "Total number of grades deleted");
    describe_counter!(
        METRIC_AUTH_FAILURES,
        "Total number of requests rejected for missing or invalid credentials"
    );
    describe_counter!(METRIC_TOKENS_ISSUED, "Total number of access tokens issued");

    debug!("Metrics initialized");
}

/// Record HTTP request latency.
pub fn record_http_latency(start: Instant, endpoint: &str, method: &str, status: u16) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "endpoint" => endpoint.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .record(latency_ms);
}

/// Increment grades created counter.
pub fn inc_grades_created() {
    counter!(METRIC_GRADES_CREATED).increment(1);
}

/// Increment grades updated counter.
pub fn inc_grades_updated() {
    counter!(METRIC_GRADES_UPDATED).increment(1);
}

/// Increment grades deleted counter.
pub fn inc_grades_deleted() {
    counter!(METRIC_GRADES_DELETED).increment(1);
}

/// Increment rejected credentials counter.
pub fn inc_auth_failures() {
    counter!(METRIC_AUTH_FAILURES).increment(1);
}

/// Increment tokens issued counter.
pub fn inc_tokens_issued() {
    counter!(METRIC_TOKENS_ISSUED).increment(1);
}

/// Middleware recording latency for every routed request.
///
/// Unmatched paths are grouped under `"unmatched"` to keep label cardinality
/// bounded.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;

    record_http_latency(start, &endpoint, &method, response.status().as_u16());
    response
}
