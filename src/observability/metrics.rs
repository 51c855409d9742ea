//! Metrics collection and exposition.
//!
//! # Metrics
//! - `correlator_events_total` (counter): lifecycle events by `event`
//! - `correlator_unknown_handle_total` (counter): events dropped for unknown handles
//! - `correlator_sessions_created_total` (counter)
//! - `correlator_live_sessions` (gauge): records currently in the store
//! - `correlator_body_fetch_total` (counter): by `direction` and `outcome`
//! - `correlator_tunnel_bytes_total` (counter): by `direction`
//! - `correlator_invalid_state_total` (counter): write-once violations

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_event(event: &'static str) {
    metrics::counter!("correlator_events_total", "event" => event).increment(1);
}

pub fn record_unknown_handle(event: &'static str) {
    metrics::counter!("correlator_unknown_handle_total", "event" => event).increment(1);
}

pub fn record_session_created(live: usize) {
    metrics::counter!("correlator_sessions_created_total").increment(1);
    record_live_sessions(live);
}

pub fn record_live_sessions(live: usize) {
    metrics::gauge!("correlator_live_sessions").set(live as f64);
}

pub fn record_body_fetch(direction: &'static str, outcome: &'static str) {
    metrics::counter!("correlator_body_fetch_total", "direction" => direction, "outcome" => outcome)
        .increment(1);
}

pub fn record_tunnel_bytes(direction: &'static str, bytes: u64) {
    metrics::counter!("correlator_tunnel_bytes_total", "direction" => direction).increment(bytes);
}

pub fn record_invalid_state() {
    metrics::counter!("correlator_invalid_state_total").increment(1);
}
