//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! registry / dispatch / server:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (reply counters and latency histogram)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Log level comes from `RUST_LOG` when set, the config otherwise
//! - Metric calls are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
