//! Metrics collection and exposition.
//!
//! # Metrics
//! - `supervisor_requests_total` (counter): requests by route, status
//! - `supervisor_request_duration_seconds` (histogram): latency distribution
//! - `supervisor_timeouts_total` (counter): deadlines hit, by route
//! - `supervisor_panics_total` (counter): handler panics, by route
//! - `supervisor_dropped_panics_total` (counter): panics after the deadline
//! - `supervisor_nil_responses_total` (counter): handlers that produced nothing
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    let labels = [
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    counter!("supervisor_requests_total", &labels).increment(1);
    histogram!("supervisor_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_timeout(route: &str) {
    counter!("supervisor_timeouts_total", "route" => route.to_string()).increment(1);
}

pub fn record_panic(route: &str) {
    counter!("supervisor_panics_total", "route" => route.to_string()).increment(1);
}

pub fn record_dropped_panic(route: &str) {
    counter!("supervisor_dropped_panics_total", "route" => route.to_string()).increment(1);
}

pub fn record_nil_response(route: &str) {
    counter!("supervisor_nil_responses_total", "route" => route.to_string()).increment(1);
}
