//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count dispatch outcomes
//! - Expose a Prometheus-compatible scrape endpoint (optional)
//!
//! # Metrics
//! - `router_dispatch_total` (counter): dispatched requests by method, outcome
//!
//! # Design Decisions
//! - Recording goes through the global `metrics` recorder; without an
//!   installed recorder every update is a no-op
//! - Outcome and method labels are closed sets of static strings; extension
//!   methods are counted as `OTHER`

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const OUTCOME_HANDLED: &str = "handled";
pub const OUTCOME_OPTIONS: &str = "options";
pub const OUTCOME_METHOD_NOT_ALLOWED: &str = "method_not_allowed";
pub const OUTCOME_NOT_FOUND: &str = "not_found";

pub const METHOD_OTHER: &str = "OTHER";

const STANDARD_METHODS: [&str; 9] = [
    "GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE", "PATCH",
];

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Label value for a request method: the uppercased standard verb, or
/// [`METHOD_OTHER`].
pub fn method_label(method: &str) -> &'static str {
    STANDARD_METHODS
        .iter()
        .copied()
        .find(|standard| standard.eq_ignore_ascii_case(method))
        .unwrap_or(METHOD_OTHER)
}

/// Record the outcome of one dispatch.
pub fn record_dispatch(method: &str, outcome: &'static str) {
    metrics::counter!(
        "router_dispatch_total",
        "method" => method_label(method),
        "outcome" => outcome
    )
    .increment(1);
}
