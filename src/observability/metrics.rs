//! Metrics collection and exposition.
//!
//! # Metrics
//! - `frontend_requests_total` (counter): work units by outcome and status
//! - `frontend_request_duration_seconds` (histogram): work unit latency
//! - `frontend_connect_failures_total` (counter): failed backend connects
//! - `frontend_pool_exhausted_total` (counter): acquires that found nothing
//! - `frontend_pool_addresses` (gauge): pool entries by state
//! - `frontend_resolution_failures_total` (counter): failed refresh ticks
//!
//! Updates are no-ops until a recorder is installed.

use std::net::SocketAddr;
use std::time::Instant;

use crate::load_balancer::pool::PoolSnapshot;

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished work unit.
pub fn record_request(outcome: &'static str, status: u16, backend: &str, start: Instant) {
    metrics::counter!(
        "frontend_requests_total",
        "outcome" => outcome,
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
    metrics::histogram!("frontend_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_connect_failure(backend: &str) {
    metrics::counter!("frontend_connect_failures_total", "backend" => backend.to_string())
        .increment(1);
}

pub fn record_pool_exhausted() {
    metrics::counter!("frontend_pool_exhausted_total").increment(1);
}

pub fn record_resolution_failure() {
    metrics::counter!("frontend_resolution_failures_total").increment(1);
}

pub fn record_pool(snapshot: &PoolSnapshot) {
    metrics::gauge!("frontend_pool_addresses", "state" => "available")
        .set(snapshot.available as f64);
    metrics::gauge!("frontend_pool_addresses", "state" => "checked_out")
        .set(snapshot.checked_out as f64);
    metrics::gauge!("frontend_pool_addresses", "state" => "stale").set(snapshot.stale as f64);
}
