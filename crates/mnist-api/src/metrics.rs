//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "mnist_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "mnist_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "mnist_http_requests_in_flight";

    // Prediction metrics
    pub const PREDICTIONS_TOTAL: &str = "mnist_predictions_total";
    pub const PREDICTION_FAILURES_TOTAL: &str = "mnist_prediction_failures_total";
    pub const INFERENCE_DURATION_SECONDS: &str = "mnist_inference_duration_seconds";
}

/// Label used for requests that matched no route.
const UNMATCHED_PATH: &str = "unmatched";

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a successful prediction.
pub fn record_prediction(class_index: usize, duration_secs: f64) {
    let labels = [("class", class_index.to_string())];
    counter!(names::PREDICTIONS_TOTAL, &labels).increment(1);
    histogram!(names::INFERENCE_DURATION_SECONDS).record(duration_secs);
}

/// Record a failed prediction.
pub fn record_prediction_failure(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::PREDICTION_FAILURES_TOTAL, &labels).increment(1);
}

/// Route template for metrics labels, so raw paths never become labels.
fn route_label(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string())
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = route_label(&request);
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
