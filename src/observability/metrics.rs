//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wallet_sync_attempts_total` (counter): retry loop attempts by operation, outcome
//! - `wallet_transitions_total` (counter): status transitions by target status
//! - `wallet_signatures_total` (counter): collected signatures by result
//! - `wallet_remote_calls_total` (counter): node/relay calls by service, method, outcome
//! - `wallet_pending_transactions` (gauge): transactions watched by pending sync

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_sync_attempt(operation: &'static str, outcome: &'static str) {
    counter!("wallet_sync_attempts_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
}

pub fn record_transition(status: &'static str) {
    counter!("wallet_transitions_total", "status" => status).increment(1);
}

pub fn record_signature(result: &'static str) {
    counter!("wallet_signatures_total", "result" => result).increment(1);
}

pub fn record_remote_call(service: &'static str, method: &'static str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    counter!(
        "wallet_remote_calls_total",
        "service" => service,
        "method" => method,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_pending_transactions(count: usize) {
    gauge!("wallet_pending_transactions").set(count as f64);
}
