//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "slate_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "slate_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "slate_http_requests_in_flight";

    // Schedule builds
    pub const SCHEDULE_BUILDS_TOTAL: &str = "slate_schedule_builds_total";
    pub const SCHEDULE_BUILD_DURATION_SECONDS: &str = "slate_schedule_build_duration_seconds";
    pub const SCHEDULE_DAYS_SKIPPED_TOTAL: &str = "slate_schedule_days_skipped_total";

    // LLM planner
    pub const PLANNER_CALLS_TOTAL: &str = "slate_planner_calls_total";
    pub const PLANNER_CALL_DURATION_SECONDS: &str = "slate_planner_call_duration_seconds";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "slate_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a finished schedule build by outcome (`success`, `validation`, ...).
pub fn record_schedule_build(outcome: &str, cache_hit: bool, duration_secs: f64) {
    let labels = [
        ("outcome", outcome.to_string()),
        ("cache", if cache_hit { "hit" } else { "miss" }.to_string()),
    ];
    counter!(names::SCHEDULE_BUILDS_TOTAL, &labels).increment(1);
    histogram!(names::SCHEDULE_BUILD_DURATION_SECONDS, "outcome" => outcome.to_string())
        .record(duration_secs);
}

/// Record a planned day that could not be persisted.
pub fn record_day_skipped() {
    counter!(names::SCHEDULE_DAYS_SKIPPED_TOTAL).increment(1);
}

/// Record one planner attempt.
pub fn record_planner_call(model: &str, outcome: &str, duration_secs: f64) {
    let labels = [("model", model.to_string()), ("outcome", outcome.to_string())];
    counter!(names::PLANNER_CALLS_TOTAL, &labels).increment(1);
    histogram!(names::PLANNER_CALL_DURATION_SECONDS, "model" => model.to_string()).record(duration_secs);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse id segments so label cardinality stays bounded.
pub fn sanitize_path(path: &str) -> String {
    let mut previous = "";
    let segments: Vec<&str> = path
        .split('/')
        .map(|segment| {
            let replaced = match previous {
                "projects" if !segment.is_empty() => ":project_id",
                _ if looks_like_id(segment) => ":id",
                _ => segment,
            };
            previous = segment;
            replaced
        })
        .collect();
    segments.join("/")
}

fn looks_like_id(segment: &str) -> bool {
    let is_uuid = segment.len() == 36
        && segment
            .chars()
            .all(|c| c.is_ascii_hexdigit() || c == '-');
    let is_numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());
    is_uuid || is_numeric
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/projects/Xy12abc/schedule"),
            "/api/projects/:project_id/schedule"
        );
        assert_eq!(
            sanitize_path("/api/days/550e8400-e29b-41d4-a716-446655440000"),
            "/api/days/:id"
        );
        assert_eq!(sanitize_path("/api/items/42"), "/api/items/:id");
        assert_eq!(sanitize_path("/api/schedule/build"), "/api/schedule/build");
        assert_eq!(sanitize_path("/health"), "/health");
    }
}
