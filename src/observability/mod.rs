//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! net, dispatch, lifecycle produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!     → spans.rs   (per-request spans carrying connection and request ids)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a dispatch via its span
//! - Recording a metric with no exporter installed is a no-op

pub mod logging;
pub mod metrics;
pub mod spans;

pub use logging::{init_logging, LoggingError};
pub use self::metrics::{init_metrics, MetricsError};
