//! Metrics collection and exposition.
//!
//! # Metrics
//! - `allocator_allocations_total` (counter): allocations by outcome
//! - `allocator_allocation_duration_seconds` (histogram): end-to-end latency
//! - `allocator_probe_failures_total` (counter): failed probes by backend
//! - `allocator_orphaned_credentials_total` (counter): created but unconfigured keys
//! - `allocator_pool_reloads_total` (counter): pool reloads by result
//! - `allocator_pool_size` (gauge): addresses in the installed snapshot
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter and serve it on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_allocation(outcome: &'static str, started: Instant) {
    metrics::counter!("allocator_allocations_total", "outcome" => outcome).increment(1);
    metrics::histogram!("allocator_allocation_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_probe_failure(backend: &str) {
    metrics::counter!("allocator_probe_failures_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_orphan(backend: &str) {
    metrics::counter!("allocator_orphaned_credentials_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_pool_reload(result: &'static str) {
    metrics::counter!("allocator_pool_reloads_total", "result" => result).increment(1);
}

pub fn record_pool_size(size: usize) {
    metrics::gauge!("allocator_pool_size").set(size as f64);
}
