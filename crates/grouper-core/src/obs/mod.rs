//! Observability: runtime telemetry (metrics) and sink abstractions.
//!
//! This module does not inspect hash tables or spill streams directly.
//! GROUP BY execution reports through `MetricsEvent` only.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventOps, EventPerf, EventReport};
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink};
