//! Metrics collection and exposition.
//!
//! # Metrics
//! - `api_sessions_accepted_total` (counter): connections admitted into a slot
//! - `api_sessions_rejected_total` (counter): connections dropped at capacity
//! - `api_sessions_closed_total` (counter): sessions closed, by outcome
//! - `api_active_sessions` (gauge): occupied slots
//! - `exchange_requests_total` (counter): exchange calls, by operation and result
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing when the exporter is disabled.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_session_accepted() {
    metrics::counter!("api_sessions_accepted_total").increment(1);
}

pub fn record_session_rejected() {
    metrics::counter!("api_sessions_rejected_total").increment(1);
}

pub fn record_session_closed(outcome: &'static str) {
    metrics::counter!("api_sessions_closed_total", "outcome" => outcome).increment(1);
}

pub fn record_active_sessions(count: usize) {
    metrics::gauge!("api_active_sessions").set(count as f64);
}

pub fn record_exchange_request(op: &'static str, result: &'static str) {
    metrics::counter!("exchange_requests_total", "op" => op, "result" => result).increment(1);
}
