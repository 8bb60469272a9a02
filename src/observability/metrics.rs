//! Metrics collection and exposition.
//!
//! # Metrics
//! - `authserver_connections_active` (gauge): currently open connections
//! - `authserver_connections_total` (counter): accepted connections
//! - `authserver_units_dropped_total` (counter): non-request units, by `reason`
//! - `authserver_requests_dispatched_total` (counter): by `category`
//! - `authserver_requests_unhandled_total` (counter): no processor, by `category`
//! - `authserver_faults_total` (counter): connections closed on fault, by `kind`
//! - `authserver_dispatch_duration_seconds` (histogram): by `category`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use thiserror::Error;

use crate::dispatch::classify::RequestCategory;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to start Prometheus exporter on {address}: {source}")]
    Exporter {
        address: SocketAddr,
        #[source]
        source: BuildError,
    },
}

/// Install the global recorder and serve `/metrics` on `address`.
pub fn init_metrics(address: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .map_err(|source| MetricsError::Exporter { address, source })?;
    tracing::info!(%address, "Metrics exporter listening");
    Ok(())
}

pub fn record_connection_opened() {
    ::metrics::counter!("authserver_connections_total").increment(1);
    ::metrics::gauge!("authserver_connections_active").increment(1.0);
}

pub fn record_connection_closed() {
    ::metrics::gauge!("authserver_connections_active").decrement(1.0);
}

pub fn record_dropped(reason: &'static str) {
    ::metrics::counter!("authserver_units_dropped_total", "reason" => reason).increment(1);
}

pub fn record_dispatched(category: RequestCategory) {
    ::metrics::counter!(
        "authserver_requests_dispatched_total",
        "category" => category.as_str()
    )
    .increment(1);
}

/// `category` is a category name, or `unclassified` for unknown methods.
pub fn record_unhandled(category: &'static str) {
    ::metrics::counter!("authserver_requests_unhandled_total", "category" => category)
        .increment(1);
}

pub fn record_fault(kind: &'static str) {
    ::metrics::counter!("authserver_faults_total", "kind" => kind).increment(1);
}

pub fn record_dispatch_duration(category: RequestCategory, started: Instant) {
    ::metrics::histogram!(
        "authserver_dispatch_duration_seconds",
        "category" => category.as_str()
    )
    .record(started.elapsed().as_secs_f64());
}
