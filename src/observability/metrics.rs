//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_connections_total` (counter): accepted client connections
//! - `proxy_requests_total` (counter): routed requests by `kind` (connect, http)
//! - `proxy_bad_requests_total` (counter): requests answered with 400
//! - `proxy_upstream_connect_failures_total` (counter): 502s by `kind`
//! - `proxy_relay_sessions_total` (counter): finished relays by `kind` and `end`
//! - `proxy_relay_bytes_total` (counter): relayed bytes by `kind` and `direction`
//! - `proxy_active_workers` (gauge): workers holding a pool slot
//!
//! Without an installed recorder every macro here is a no-op.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::net::relay::RelayOutcome;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(error) => tracing::error!(address = %addr, error = %error, "Failed to install metrics exporter"),
    }
}

pub fn record_connection() {
    counter!("proxy_connections_total").increment(1);
}

pub fn record_request(kind: &'static str) {
    counter!("proxy_requests_total", "kind" => kind).increment(1);
}

pub fn record_bad_request() {
    counter!("proxy_bad_requests_total").increment(1);
}

pub fn record_upstream_failure(kind: &'static str) {
    counter!("proxy_upstream_connect_failures_total", "kind" => kind).increment(1);
}

pub fn record_relay(kind: &'static str, outcome: &RelayOutcome) {
    counter!("proxy_relay_sessions_total", "kind" => kind, "end" => outcome.end.as_str())
        .increment(1);
    counter!("proxy_relay_bytes_total", "kind" => kind, "direction" => "client_to_upstream")
        .increment(outcome.client_to_upstream);
    counter!("proxy_relay_bytes_total", "kind" => kind, "direction" => "upstream_to_client")
        .increment(outcome.upstream_to_client);
}
