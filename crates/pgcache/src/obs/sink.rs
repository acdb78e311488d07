//! Metrics sink boundary.
//!
//! Engine logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
use crate::{
    mutate::{InvalidationReason, Operation},
    obs::metrics,
};
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = RefCell::new(None);
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    MutationStart {
        operation: Operation,
        table: &'a str,
    },
    MutationFinish {
        operation: Operation,
        table: &'a str,
        updated: u64,
        invalidated: u64,
    },
    EntriesScanned {
        table: &'a str,
        entries: u64,
    },
    ForeignKeySkipped {
        table: &'a str,
    },
    EntryUpdated {
        table: &'a str,
    },
    EntryInvalidated {
        table: &'a str,
        reason: InvalidationReason,
    },
    RequestRejected {
        table: &'a str,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent<'_>);
}

/// GlobalMetricsSink
/// Default process-local sink that writes into global metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::MutationStart { operation, table } => {
                metrics::with_state_mut(|m| metrics::record_call(m, operation, table));
            }

            MetricsEvent::MutationFinish {
                updated,
                invalidated,
                ..
            } => {
                metrics::with_state_mut(|m| metrics::record_finish(m, updated, invalidated));
            }

            MetricsEvent::EntriesScanned { table, entries } => {
                metrics::with_state_mut(|m| {
                    m.ops.entries_scanned = m.ops.entries_scanned.saturating_add(entries);
                    let entry = m.tables.entry(table.to_string()).or_default();
                    entry.entries_scanned = entry.entries_scanned.saturating_add(entries);
                });
            }

            MetricsEvent::ForeignKeySkipped { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.foreign_keys_skipped = m.ops.foreign_keys_skipped.saturating_add(1);
                });
            }

            MetricsEvent::EntryUpdated { table } => {
                metrics::with_state_mut(|m| {
                    m.ops.entries_updated = m.ops.entries_updated.saturating_add(1);
                    let entry = m.tables.entry(table.to_string()).or_default();
                    entry.entries_updated = entry.entries_updated.saturating_add(1);
                });
            }

            MetricsEvent::EntryInvalidated { table, reason } => {
                metrics::with_state_mut(|m| {
                    m.ops.entries_invalidated = m.ops.entries_invalidated.saturating_add(1);
                    let by_reason = m.invalidations.entry(reason).or_default();
                    *by_reason = by_reason.saturating_add(1);
                    let entry = m.tables.entry(table.to_string()).or_default();
                    entry.entries_invalidated = entry.entries_invalidated.saturating_add(1);
                });
            }

            MetricsEvent::RequestRejected { table } => {
                metrics::with_state_mut(|m| {
                    m.ops.rejected_requests = m.ops.rejected_requests.saturating_add(1);
                    let entry = m.tables.entry(table.to_string()).or_default();
                    entry.rejected_requests = entry.rejected_requests.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent<'_>) {
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match sink {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the current metrics state.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
///
/// The previous sink is restored on every exit, including unwinding.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let prev = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = prev;
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

/// MutationSpan
/// RAII guard that emits start/finish events for one engine call.
/// Ensures finish accounting happens even on early return.

pub(crate) struct MutationSpan<'a> {
    operation: Operation,
    table: &'a str,
    updated: u64,
    invalidated: u64,
}

impl<'a> MutationSpan<'a> {
    #[must_use]
    pub(crate) fn new(operation: Operation, table: &'a str) -> Self {
        record(MetricsEvent::MutationStart { operation, table });

        Self {
            operation,
            table,
            updated: 0,
            invalidated: 0,
        }
    }

    pub(crate) const fn set_outcome(&mut self, updated: u64, invalidated: u64) {
        self.updated = updated;
        self.invalidated = invalidated;
    }
}

impl Drop for MutationSpan<'_> {
    fn drop(&mut self) {
        record(MetricsEvent::MutationFinish {
            operation: self.operation,
            table: self.table,
            updated: self.updated,
            invalidated: self.invalidated,
        });
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture(RefCell<Vec<String>>);

    impl MetricsSink for Capture {
        fn record(&self, event: MetricsEvent<'_>) {
            self.0.borrow_mut().push(format!("{event:?}"));
        }
    }

    #[test]
    fn override_captures_events_and_is_restored() {
        metrics_reset_all();
        let capture = Rc::new(Capture::default());

        with_metrics_sink(capture.clone(), || {
            record(MetricsEvent::EntryUpdated { table: "contact" });
        });
        record(MetricsEvent::EntryUpdated { table: "contact" });

        assert_eq!(capture.0.borrow().len(), 1);
        let report = metrics_report();
        assert_eq!(report.counters.map(|c| c.ops.entries_updated), Some(1));
    }

    #[test]
    fn span_records_start_and_finish() {
        let capture = Rc::new(Capture::default());

        with_metrics_sink(capture.clone(), || {
            let mut span = MutationSpan::new(Operation::Delete, "contact");
            span.set_outcome(2, 1);
        });

        let events = capture.0.borrow();
        assert_eq!(events.len(), 2);
        assert!(events[0].starts_with("MutationStart"));
        assert!(events[1].contains("updated: 2"));
    }

    #[test]
    fn global_sink_aggregates_per_table() {
        metrics_reset_all();

        record(MetricsEvent::MutationStart {
            operation: Operation::Insert,
            table: "contact",
        });
        record(MetricsEvent::EntriesScanned {
            table: "contact",
            entries: 4,
        });
        record(MetricsEvent::EntryInvalidated {
            table: "contact",
            reason: InvalidationReason::PaginationBoundary,
        });

        let report = metrics_report();
        let summary = &report.table_counters[0];
        assert_eq!(summary.table, "contact");
        assert_eq!(summary.mutations, 1);
        assert_eq!(summary.entries_invalidated, 1);
        assert!((summary.avg_entries_per_mutation - 4.0).abs() < f64::EPSILON);

        let counters = report.counters.expect("counters present");
        assert_eq!(counters.ops.insert_calls, 1);
        assert_eq!(
            counters.invalidations.get(&InvalidationReason::PaginationBoundary),
            Some(&1)
        );
    }
}
