//! Metrics collection and exposition.
//!
//! # Metrics
//! - `storefront_requests_total` (counter): requests by method, status
//! - `storefront_request_duration_seconds` (histogram): latency distribution
//! - `storefront_gateways_ready` (gauge): gateways that reported ready
//! - `storefront_bootstrap_stage_seconds` (histogram): time per bootstrap stage
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with a scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count a served request and record its latency.
pub fn record_request(method: &str, status: u16, elapsed: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("storefront_requests_total", &labels).increment(1);
    metrics::histogram!("storefront_request_duration_seconds", &labels).record(elapsed.as_secs_f64());
}

pub fn record_gateways_ready(ready: usize) {
    metrics::gauge!("storefront_gateways_ready").set(ready as f64);
}

/// Record how long a bootstrap stage took.
pub fn record_stage(stage: &'static str, elapsed: Duration) {
    metrics::histogram!("storefront_bootstrap_stage_seconds", "stage" => stage).record(elapsed.as_secs_f64());
}
