//! Service middleware for request metrics.
//!
//! ## Metrics Exposed
//!
//! - `request` - Request count and latency by path pattern, method, status
//! - `session_event` - Session lifecycle transitions by action and resulting state

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::info;

/// Metrics middleware that records request counts and latency.
///
/// Emitted as tracing events under the `narrative_kernel::metrics` target
/// so they can be aggregated from logs.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "narrative_kernel::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

fn uuid_regex() -> Option<&'static regex_lite::Regex> {
    static UUID: OnceLock<Option<regex_lite::Regex>> = OnceLock::new();
    UUID.get_or_init(|| {
        regex_lite::Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").ok()
    })
    .as_ref()
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces session and story UUIDs with an `:id` placeholder.
fn normalize_path(path: &str) -> String {
    match uuid_regex() {
        Some(re) => re.replace_all(path, ":id").to_string(),
        None => path.to_string(),
    }
}

/// Record a session lifecycle transition.
pub fn record_session_event(action: &str, state: &str) {
    info!(
        target: "narrative_kernel::metrics",
        metric_type = "session_event",
        action = action,
        state = state,
        "session_event_metric"
    );
}
