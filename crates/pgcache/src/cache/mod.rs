//! Cache collaborator boundary: the stored entry shapes and the adapter
//! trait the mutation engine reads and writes through.

mod memory;


use crate::{error::InternalError, query::Window, row::Row};
use serde::{Deserialize, Serialize};

// re-exports
pub use memory::MemoryCache;

///
/// CacheEntry
///
/// One cached query result.
///
/// Single → `single` / `maybe_single` queries (`None` is a cached "no row")
/// Rows   → array results, optionally with a total count
/// Page   → array results bounded by an inclusive row window
/// Count  → count-only (`HEAD`) results
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CacheEntry {
    Single(Option<Row>),
    Rows {
        rows: Vec<Row>,
        count: Option<u64>,
    },
    Page {
        rows: Vec<Row>,
        window: Window,
        count: Option<u64>,
    },
    Count(u64),
}

impl CacheEntry {
    #[must_use]
    pub const fn rows(rows: Vec<Row>) -> Self {
        Self::Rows { rows, count: None }
    }

    #[must_use]
    pub const fn counted_rows(rows: Vec<Row>, count: u64) -> Self {
        Self::Rows {
            rows,
            count: Some(count),
        }
    }

    #[must_use]
    pub const fn page(rows: Vec<Row>, window: Window) -> Self {
        Self::Page {
            rows,
            window,
            count: None,
        }
    }

    /// Cached rows, in result order.
    #[must_use]
    pub fn row_slice(&self) -> &[Row] {
        match self {
            Self::Single(Some(row)) => std::slice::from_ref(row),
            Self::Rows { rows, .. } | Self::Page { rows, .. } => rows,
            Self::Single(None) | Self::Count(_) => &[],
        }
    }

    /// Total count carried by the entry, if any.
    #[must_use]
    pub const fn count(&self) -> Option<u64> {
        match self {
            Self::Rows { count, .. } | Self::Page { count, .. } => *count,
            Self::Count(count) => Some(*count),
            Self::Single(_) => None,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Single(_) => "single",
            Self::Rows { .. } => "rows",
            Self::Page { .. } => "page",
            Self::Count(_) => "count",
        }
    }
}

///
/// CacheAdapter
///
/// Storage collaborator. Keys are produced by [`crate::codec::KeyCodec`];
/// a store may hold unrelated keys, which the engine skips after a failed
/// decode.
///

pub trait CacheAdapter {
    /// Enumerate entries that may belong to `table`. Over-approximating is
    /// allowed; every returned key is decoded and checked by the caller.
    fn scan(&self, table: &str) -> Result<Vec<(String, CacheEntry)>, InternalError>;

    /// Atomically replace the entry stored under `key`.
    fn commit(&mut self, key: &str, entry: CacheEntry) -> Result<(), InternalError>;

    /// Mark the entry under `key` stale so it is refetched.
    fn invalidate(&mut self, key: &str) -> Result<(), InternalError>;
}
