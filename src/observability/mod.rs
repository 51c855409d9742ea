//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! store / correlator / observer produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and gauges via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Every log line carries `handle` and, once known, `session`
//! - Metric updates are cheap no-ops until an exporter is installed
//! - Unknown-handle drops are logged at trace level only

pub mod logging;
pub mod metrics;
