//! Metrics collection and exposition.
//!
//! # Metrics
//! - `image_proxy_requests_total` (counter): image requests by status
//! - `image_proxy_request_duration_seconds` (histogram): pipeline latency
//! - `image_proxy_admission_total` (counter): gate outcomes
//! - `image_proxy_admission_available` (gauge): free admission slots
//! - `image_proxy_origin_bytes` (histogram): fetched body sizes
//! - `image_proxy_origin_fetch_duration_seconds` (histogram)
//! - `image_proxy_transform_duration_seconds` (histogram): by outcome
//! - `image_proxy_transform_faults_total` (counter): contained engine panics
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within the tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16, start: Instant) {
    counter!("image_proxy_requests_total", "status" => status.to_string()).increment(1);
    histogram!("image_proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_admission(outcome: &'static str, available: usize) {
    counter!("image_proxy_admission_total", "outcome" => outcome).increment(1);
    gauge!("image_proxy_admission_available").set(available as f64);
}

pub fn record_origin_fetch(bytes: usize, start: Instant) {
    histogram!("image_proxy_origin_bytes").record(bytes as f64);
    histogram!("image_proxy_origin_fetch_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_transform(start: Instant, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    histogram!("image_proxy_transform_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_transform_fault() {
    counter!("image_proxy_transform_faults_total").increment(1);
}
