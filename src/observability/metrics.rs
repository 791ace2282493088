//! Metrics collection and exposition.
//!
//! # Metrics
//! - `hub_splice_dispatch_total` (counter): routing decisions by event and
//!   outcome (`claimed` / `passthrough`)
//! - `hub_splice_unanswered_total` (counter): exchanges the host runtime
//!   had to answer itself, by event and status
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exporter is optional and owns its own listener

use axum::http::StatusCode;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::routing::Dispatch;
use crate::server::EventKind;

pub const DISPATCH_TOTAL: &str = "hub_splice_dispatch_total";
pub const UNANSWERED_TOTAL: &str = "hub_splice_unanswered_total";

/// Install the Prometheus recorder and scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dispatch(event: EventKind, outcome: Dispatch) {
    metrics::counter!(
        DISPATCH_TOTAL,
        "event" => event.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_unanswered(event: EventKind, status: StatusCode) {
    metrics::counter!(
        UNANSWERED_TOTAL,
        "event" => event.as_str(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
}
