use crate::mutate::{InvalidationReason, Operation};
use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::BTreeMap};

///
/// EventState
/// Ephemeral, in-memory counters for mutation processing.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub tables: BTreeMap<String, TableCounters>,
    pub invalidations: BTreeMap<InvalidationReason, u64>,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Engine entrypoints
    pub insert_calls: u64,
    pub update_calls: u64,
    pub upsert_calls: u64,
    pub delete_calls: u64,
    pub rejected_requests: u64,

    // Finished calls, by outcome
    pub finished_calls: u64,
    pub calls_with_updates: u64,
    pub calls_with_invalidations: u64,

    // Entries visited
    pub entries_scanned: u64,
    pub foreign_keys_skipped: u64,

    // Entry outcomes
    pub entries_updated: u64,
    pub entries_invalidated: u64,
}

///
/// TableCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TableCounters {
    pub mutations: u64,
    pub rejected_requests: u64,
    pub entries_scanned: u64,
    pub entries_updated: u64,
    pub entries_invalidated: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

/// Count one engine entrypoint call, globally and for `table`.
pub(crate) fn record_call(m: &mut EventState, operation: Operation, table: &str) {
    let ops = &mut m.ops;
    let counter = match operation {
        Operation::Insert => &mut ops.insert_calls,
        Operation::Update => &mut ops.update_calls,
        Operation::Upsert => &mut ops.upsert_calls,
        Operation::Delete => &mut ops.delete_calls,
    };
    *counter = counter.saturating_add(1);

    let entry = m.tables.entry(table.to_string()).or_default();
    entry.mutations = entry.mutations.saturating_add(1);
}

/// Count one finished engine call by the entries it touched.
pub(crate) fn record_finish(m: &mut EventState, updated: u64, invalidated: u64) {
    let ops = &mut m.ops;
    ops.finished_calls = ops.finished_calls.saturating_add(1);
    if updated > 0 {
        ops.calls_with_updates = ops.calls_with_updates.saturating_add(1);
    }
    if invalidated > 0 {
        ops.calls_with_invalidations = ops.calls_with_invalidations.saturating_add(1);
    }
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    /// Ephemeral runtime counters.
    pub counters: Option<EventState>,
    /// Per-table counters and averages.
    pub table_counters: Vec<TableSummary>,
}

///
/// TableSummary
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TableSummary {
    pub table: String,
    pub mutations: u64,
    pub rejected_requests: u64,
    pub entries_scanned: u64,
    pub entries_updated: u64,
    pub entries_invalidated: u64,
    pub avg_entries_per_mutation: f64,
}

/// Build a report from the in-memory counters.
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub(crate) fn report() -> EventReport {
    let snap = with_state(Clone::clone);

    let mut table_counters: Vec<TableSummary> = snap
        .tables
        .iter()
        .map(|(table, counters)| {
            let avg = if counters.mutations > 0 {
                counters.entries_scanned as f64 / counters.mutations as f64
            } else {
                0.0
            };

            TableSummary {
                table: table.clone(),
                mutations: counters.mutations,
                rejected_requests: counters.rejected_requests,
                entries_scanned: counters.entries_scanned,
                entries_updated: counters.entries_updated,
                entries_invalidated: counters.entries_invalidated,
                avg_entries_per_mutation: avg,
            }
        })
        .collect();

    // Busiest tables first; name breaks ties.
    table_counters.sort_by(|a, b| {
        b.mutations
            .cmp(&a.mutations)
            .then_with(|| a.table.cmp(&b.table))
    });

    EventReport {
        counters: Some(snap),
        table_counters,
    }
}
