//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mock_requests_total` (counter): requests by status and outcome
//! - `mock_request_duration_seconds` (histogram): latency, delay included
//! - `mock_route_table_version` (gauge): version of the active table
//! - `mock_templates_loaded` (gauge): templates in the active catalog
//! - `mock_template_failures` (gauge): templates that failed their last load
//!
//! Recording before [`init_metrics`] is a no-op, so library code and tests
//! can call these freely.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the global recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one served mock request.
pub fn record_request(status: u16, outcome: &'static str, start: Instant) {
    metrics::counter!("mock_requests_total", "status" => status.to_string(), "outcome" => outcome)
        .increment(1);
    metrics::histogram!("mock_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_table_version(version: u64) {
    metrics::gauge!("mock_route_table_version").set(version as f64);
}

pub fn record_templates(loaded: usize, failed: usize) {
    metrics::gauge!("mock_templates_loaded").set(loaded as f64);
    metrics::gauge!("mock_template_failures").set(failed as f64);
}
