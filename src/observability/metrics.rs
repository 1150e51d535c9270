//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by endpoint, status
//! - `proxy_request_duration_seconds` (histogram): time to response headers
//! - `proxy_active_streams` (gauge): relays currently copying bytes
//! - `proxy_streams_total` (counter): finished relays by outcome
//! - `proxy_relayed_bytes_total` (counter): body bytes handed to clients
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter
//! - Labels for endpoint, status code, stream outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(endpoint: &'static str, status: u16, start: Instant) {
    counter!("proxy_requests_total", "endpoint" => endpoint, "status" => status.to_string())
        .increment(1);
    histogram!("proxy_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

pub fn stream_started() {
    gauge!("proxy_active_streams").increment(1.0);
}

pub fn stream_finished(bytes: u64, outcome: &'static str) {
    gauge!("proxy_active_streams").decrement(1.0);
    counter!("proxy_streams_total", "outcome" => outcome).increment(1);
    counter!("proxy_relayed_bytes_total").increment(bytes);
}
