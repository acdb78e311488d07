//! Observability: mutation-engine telemetry and sink abstractions.
//!
//! The engine never touches counters directly; every event flows through
//! `sink::record`.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventOps, EventReport, EventState, TableCounters, TableSummary};
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink};
