//! Metrics collection and exposition.
//!
//! # Metrics
//! - `stagehand_replies_total` (counter): executed replies by kind, status
//! - `stagehand_reply_duration_seconds` (histogram): reply execution time
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op
//! - Labels stay low-cardinality: reply kind and numeric status

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REPLIES_TOTAL: &str = "stagehand_replies_total";
pub const REPLY_DURATION: &str = "stagehand_reply_duration_seconds";

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Record one executed reply.
pub fn record_reply(kind: &'static str, status: u16, started: Instant) {
    metrics::counter!(REPLIES_TOTAL, "kind" => kind, "status" => status.to_string()).increment(1);
    metrics::histogram!(REPLY_DURATION, "kind" => kind).record(started.elapsed().as_secs_f64());
}
