//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus recorder and return the render handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "animo_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "animo_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "animo_http_requests_in_flight";

    // Domain metrics
    pub const ORDERS_CREATED_TOTAL: &str = "animo_orders_created_total";
    pub const UPLOADS_TOTAL: &str = "animo_uploads_total";
    pub const UPLOAD_BYTES: &str = "animo_upload_bytes";
    pub const STALE_JOBS_RECOVERED_TOTAL: &str = "animo_stale_jobs_recovered_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "animo_rate_limit_hits_total";
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_order_created() {
    counter!(names::ORDERS_CREATED_TOTAL).increment(1);
}

pub fn record_upload(aspect_ratio: &'static str, bytes: usize) {
    counter!(names::UPLOADS_TOTAL, "aspect_ratio" => aspect_ratio).increment(1);
    histogram!(names::UPLOAD_BYTES).record(bytes as f64);
}

pub fn record_stale_jobs_recovered(count: u32) {
    counter!(names::STALE_JOBS_RECOVERED_TOTAL).increment(u64::from(count));
}

pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

static UUID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}").unwrap()
});

/// Collapse ids in paths so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    UUID_SEGMENT.replace_all(path, ":id").to_string()
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
