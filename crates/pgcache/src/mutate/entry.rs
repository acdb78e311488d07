//! Per-entry state machine: applies one mutation request to one decoded
//! cache entry and reports whether the entry changed, stayed put, or can
//! no longer be patched.

use crate::{
    cache::CacheEntry,
    identity::{KeyIndex, PrimaryKey, extract_key},
    mutate::{
        Operation,
        order::{MissingOrderColumn, order_changed, placement},
    },
    predicate::{EvalError, matches},
    query::{CountMode, QueryDescriptor, Window},
    row::{Row, merge},
};
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// InvalidationReason
///
/// Why an entry could not be patched in place.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum InvalidationReason {
    /// A candidate row belongs next to the page, not provably inside it.
    PaginationBoundary,
    /// The predicate could not be evaluated (missing column, type mismatch).
    EvalFailed,
    /// A paginated entry has no ORDER BY, so positions are unknown.
    UnorderedPage,
    /// A cached row does not carry a column the entry is ordered by.
    OrderUndetermined,
    /// An update moved a row into a page that never held it.
    PageMiss,
    /// A single-row entry would have to hold two different rows.
    AmbiguousSingle,
    /// A count-only entry cannot tell whether the mutation moved rows.
    CountUnknown,
    /// A cached row lacks primary-key columns.
    IdentityUnavailable,
}

impl InvalidationReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PaginationBoundary => "pagination_boundary",
            Self::EvalFailed => "eval_failed",
            Self::UnorderedPage => "unordered_page",
            Self::OrderUndetermined => "order_undetermined",
            Self::PageMiss => "page_miss",
            Self::AmbiguousSingle => "ambiguous_single",
            Self::CountUnknown => "count_unknown",
            Self::IdentityUnavailable => "identity_unavailable",
        }
    }
}

impl fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<EvalError> for InvalidationReason {
    fn from(_: EvalError) -> Self {
        Self::EvalFailed
    }
}

impl From<MissingOrderColumn> for InvalidationReason {
    fn from(_: MissingOrderColumn) -> Self {
        Self::OrderUndetermined
    }
}

///
/// EntryOutcome
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum EntryOutcome {
    Unchanged,
    Updated(CacheEntry),
    Invalidate(InvalidationReason),
}

type Step<T = ()> = Result<T, InvalidationReason>;

///
/// EntryContext
///
/// Everything a step needs besides the entry value itself.
///

pub(crate) struct EntryContext<'a> {
    pub(crate) descriptor: &'a QueryDescriptor,
    pub(crate) primary_keys: &'a [String],
}

impl EntryContext<'_> {
    fn key_of(&self, row: &Row) -> Option<PrimaryKey> {
        extract_key(self.primary_keys, row)
    }

    fn matches(&self, row: &Row) -> Step<bool> {
        Ok(matches(&self.descriptor.filters, row)?)
    }

    fn project(&self, source: &Row, existing: Option<&Row>) -> Row {
        self.descriptor.fields.project(source, existing)
    }
}

/// Apply every payload row of one request to `entry`, in payload order.
pub(crate) fn apply_entry(
    ctx: &EntryContext<'_>,
    operation: Operation,
    payload: &[Row],
    entry: &CacheEntry,
) -> EntryOutcome {
    let mut working = Working::load(ctx, entry.clone());

    let result = match operation {
        Operation::Delete => working.delete(ctx, payload),
        Operation::Insert => working.write_all(ctx, Write::Insert, payload),
        Operation::Update => working.write_all(ctx, Write::Update, payload),
        Operation::Upsert => working.write_all(ctx, Write::Upsert, payload),
    };

    match result {
        Err(reason) => EntryOutcome::Invalidate(reason),
        Ok(()) => {
            if let Err(reason) = working.settle() {
                return EntryOutcome::Invalidate(reason);
            }
            let next = working.store();
            if &next == entry {
                EntryOutcome::Unchanged
            } else {
                EntryOutcome::Updated(next)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Write {
    Insert,
    Update,
    Upsert,
}

///
/// Working
///
/// Mutable view of an entry while a request is applied to it.
///

enum Working {
    Single(Option<Row>),
    Rows(RowSet),
    Count(u64),
}

impl Working {
    fn load(ctx: &EntryContext<'_>, entry: CacheEntry) -> Self {
        match entry {
            CacheEntry::Single(row) => Self::Single(row),
            CacheEntry::Rows { rows, count } => {
                Self::Rows(RowSet::load(ctx, rows, count, ctx.descriptor.window(), None))
            }
            CacheEntry::Page {
                rows,
                window,
                count,
            } => Self::Rows(RowSet::load(ctx, rows, count, Some(window), Some(window))),
            CacheEntry::Count(count) => Self::Count(count),
        }
    }

    fn settle(&self) -> Step {
        match self {
            Self::Rows(set) => set.settle(),
            Self::Single(_) | Self::Count(_) => Ok(()),
        }
    }

    fn store(self) -> CacheEntry {
        match self {
            Self::Single(row) => CacheEntry::Single(row),
            Self::Rows(set) => match set.stored_window {
                Some(window) => CacheEntry::Page {
                    rows: set.rows,
                    window,
                    count: set.count,
                },
                None => CacheEntry::Rows {
                    rows: set.rows,
                    count: set.count,
                },
            },
            Self::Count(count) => CacheEntry::Count(count),
        }
    }

    // Later payload rows see the effects of earlier ones.
    fn write_all(&mut self, ctx: &EntryContext<'_>, write: Write, payload: &[Row]) -> Step {
        payload.iter().try_for_each(|row| match self {
            Self::Single(current) => single_step(ctx, write, current, row),
            Self::Rows(set) => match write {
                Write::Insert => set.insert(ctx, row),
                Write::Update => set.update(ctx, row),
                Write::Upsert => set.upsert(ctx, row),
            },
            Self::Count(count) => count_step(ctx, write, count, row),
        })
    }

    fn delete(&mut self, ctx: &EntryContext<'_>, payload: &[Row]) -> Step {
        let index = KeyIndex::build(ctx.primary_keys, payload);

        match self {
            Self::Single(current) => {
                if let Some(row) = current {
                    let key = ctx.key_of(row).ok_or(InvalidationReason::IdentityUnavailable)?;
                    if index.contains(&key) {
                        *current = None;
                    }
                }
                Ok(())
            }
            Self::Rows(set) => set.delete_indexed(ctx, &index),
            Self::Count(count) => {
                *count = count.saturating_sub(to_u64(index.len()));
                Ok(())
            }
        }
    }
}

///
/// RowSet
///
/// Rows of an array entry together with its count and effective window.
/// `stored_window` is set only for entries stored as pages.
///
/// `tail_loaded` holds while the rows provably end at the last row of the
/// result: the page was short when loaded and nothing was pushed out since.
/// An exact count overrides it.
///

struct RowSet {
    rows: Vec<Row>,
    count: Option<u64>,
    exact: bool,
    window: Option<Window>,
    stored_window: Option<Window>,
    tail_loaded: bool,
}

impl RowSet {
    fn load(
        ctx: &EntryContext<'_>,
        rows: Vec<Row>,
        count: Option<u64>,
        window: Option<Window>,
        stored_window: Option<Window>,
    ) -> Self {
        let tail_loaded = window.is_none_or(|window| rows.len() < capacity(window));

        Self {
            rows,
            count,
            exact: ctx.descriptor.count == Some(CountMode::Exact),
            window,
            stored_window,
            tail_loaded,
        }
    }

    // No row of the result sorts after the last cached row.
    fn tail_known(&self) -> bool {
        let Some(window) = self.window else {
            return true;
        };

        match self.exact_count() {
            Some(count) => window.from.saturating_add(to_u64(self.rows.len())) >= count,
            None => self.tail_loaded,
        }
    }

    fn exact_count(&self) -> Option<u64> {
        self.count.filter(|_| self.exact)
    }

    // Without an exact count a short page reads as the last page when loaded
    // again, so it may only be stored short if it really is.
    fn settle(&self) -> Step {
        let short = self
            .window
            .is_some_and(|window| self.rows.len() < capacity(window));

        if short && self.exact_count().is_none() && !self.tail_loaded {
            Err(InvalidationReason::PaginationBoundary)
        } else {
            Ok(())
        }
    }

    fn insert(&mut self, ctx: &EntryContext<'_>, row: &Row) -> Step {
        if let Some(key) = ctx.key_of(row)
            && let Some(idx) = self.position_lenient(ctx, &key)
        {
            return self.update_found(ctx, idx, row);
        }

        if ctx.matches(row)? {
            self.insert_new(ctx, row)?;
        }

        Ok(())
    }

    fn update(&mut self, ctx: &EntryContext<'_>, row: &Row) -> Step {
        if let Some(idx) = self.position_strict(ctx, row)? {
            return self.update_found(ctx, idx, row);
        }

        if !ctx.matches(row)? {
            return Ok(());
        }
        if self.window.is_some() {
            return Err(InvalidationReason::PageMiss);
        }

        self.insert_new(ctx, row)
    }

    fn upsert(&mut self, ctx: &EntryContext<'_>, row: &Row) -> Step {
        if let Some(idx) = self.position_strict(ctx, row)? {
            return self.update_found(ctx, idx, row);
        }

        if ctx.matches(row)? {
            self.insert_new(ctx, row)?;
        }

        Ok(())
    }

    fn delete_indexed(&mut self, ctx: &EntryContext<'_>, index: &KeyIndex) -> Step {
        if index.is_empty() {
            return Ok(());
        }
        self.require_identities(ctx)?;

        let before = self.rows.len();
        self.rows
            .retain(|row| ctx.key_of(row).is_none_or(|key| !index.contains(&key)));
        let removed = to_u64(before - self.rows.len());
        self.adjust_count(|count| count.saturating_sub(removed));

        Ok(())
    }

    // Insert duplicate detection: rows without a key cannot collide.
    fn position_lenient(&self, ctx: &EntryContext<'_>, key: &PrimaryKey) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| ctx.key_of(row).as_ref() == Some(key))
    }

    // Update/upsert lookup: every cached row must be identifiable.
    fn position_strict(&self, ctx: &EntryContext<'_>, row: &Row) -> Step<Option<usize>> {
        self.require_identities(ctx)?;
        let Some(key) = ctx.key_of(row) else {
            return Ok(None);
        };

        Ok(self.position_lenient(ctx, &key))
    }

    fn require_identities(&self, ctx: &EntryContext<'_>) -> Step {
        if self.rows.iter().all(|row| ctx.key_of(row).is_some()) {
            Ok(())
        } else {
            Err(InvalidationReason::IdentityUnavailable)
        }
    }

    fn update_found(&mut self, ctx: &EntryContext<'_>, idx: usize, payload: &Row) -> Step {
        let existing = &self.rows[idx];
        let merged = merge(existing, payload);

        if !ctx.matches(&merged)? {
            self.rows.remove(idx);
            self.adjust_count(|count| count.saturating_sub(1));
            return Ok(());
        }

        let replacement = ctx.project(&merged, Some(existing));
        let order = &ctx.descriptor.order;
        if order.is_empty() || !order_changed(order, existing, &merged) {
            self.rows[idx] = replacement;
            return Ok(());
        }

        // Re-sort: a page cannot tell whether the row left through an edge.
        let tail_open = self.is_full() || !self.tail_known();
        self.rows.remove(idx);
        let pos = placement(order, &self.rows, &merged)?;
        if let Some(window) = self.window {
            let at_front = pos == 0 && !window.starts_at_first_row();
            let at_back = pos == self.rows.len() && tail_open;
            if at_front || at_back {
                return Err(InvalidationReason::PaginationBoundary);
            }
        }
        self.rows.insert(pos, replacement);

        Ok(())
    }

    fn insert_new(&mut self, ctx: &EntryContext<'_>, row: &Row) -> Step {
        let order = &ctx.descriptor.order;
        if self.window.is_some() && order.is_empty() {
            return Err(InvalidationReason::UnorderedPage);
        }

        let pos = if order.is_empty() {
            self.rows.len()
        } else {
            placement(order, &self.rows, row)?
        };

        if let Some(window) = self.window {
            if pos == 0 && !window.starts_at_first_row() {
                return Err(InvalidationReason::PaginationBoundary);
            }
            if pos == self.rows.len() && (self.is_full() || !self.tail_known()) {
                return Err(InvalidationReason::PaginationBoundary);
            }
        }

        self.rows.insert(pos, ctx.project(row, None));
        if let Some(window) = self.window
            && self.rows.len() > capacity(window)
        {
            self.rows.truncate(capacity(window));
            self.tail_loaded = false;
        }
        self.adjust_count(|count| count.saturating_add(1));

        Ok(())
    }

    fn is_full(&self) -> bool {
        self.window
            .is_some_and(|window| self.rows.len() >= capacity(window))
    }

    fn adjust_count(&mut self, f: impl FnOnce(u64) -> u64) {
        self.count = self.count.map(f);
    }
}

fn single_step(ctx: &EntryContext<'_>, write: Write, current: &mut Option<Row>, row: &Row) -> Step {
    let same = match current.as_ref() {
        Some(cached) => {
            let cached_key = ctx.key_of(cached);
            if cached_key.is_none() && write != Write::Insert {
                return Err(InvalidationReason::IdentityUnavailable);
            }
            cached_key.is_some() && cached_key == ctx.key_of(row)
        }
        None => false,
    };

    if same {
        let Some(cached) = current.as_ref() else {
            return Ok(());
        };
        let merged = merge(cached, row);
        *current = if ctx.matches(&merged)? {
            Some(ctx.project(&merged, Some(cached)))
        } else {
            None
        };
        return Ok(());
    }

    if !ctx.matches(row)? {
        return Ok(());
    }

    // An empty single entry is not paginated: any matching write fills it.
    if current.is_some() {
        return Err(InvalidationReason::AmbiguousSingle);
    }
    *current = Some(ctx.project(row, None));

    Ok(())
}

fn count_step(ctx: &EntryContext<'_>, write: Write, count: &mut u64, row: &Row) -> Step {
    match write {
        Write::Insert => {
            if ctx.matches(row)? {
                *count = count.saturating_add(1);
            }
            Ok(())
        }
        Write::Update => {
            let filtered = ctx.descriptor.filter_columns();
            if row.keys().any(|column| filtered.contains(column)) {
                Err(InvalidationReason::CountUnknown)
            } else {
                Ok(())
            }
        }
        Write::Upsert => Err(InvalidationReason::CountUnknown),
    }
}

fn capacity(window: Window) -> usize {
    usize::try_from(window.capacity()).unwrap_or(usize::MAX)
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}
