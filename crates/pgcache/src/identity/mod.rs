//! Module: identity
//! Responsibility: primary-key identity between rows, independent of
//! filter membership.
//! Does not own: key column discovery (callers supply the column list).
//!
//! Invariants:
//! - Identity requires every key column to be present and non-null on
//!   both rows; a partially known key never matches.
//! - Key components compare with the canonical value order, so `1` and
//!   `1.0` identify the same row.


use crate::{row::Row, value::Value};
use derive_more::{Deref, IntoIterator};
use std::{collections::BTreeMap, fmt};

///
/// PrimaryKey
///
/// Extracted key tuple, in the order of the key columns.
///

#[derive(Clone, Debug, Deref, Eq, IntoIterator, Ord, PartialEq, PartialOrd)]
pub struct PrimaryKey(Vec<Value>);

impl PrimaryKey {
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (idx, value) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ",")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

/// Extract the key tuple of `row`, or `None` when any key column is
/// absent or null (the key cannot be determined).
#[must_use]
pub fn extract_key(pk_columns: &[String], row: &Row) -> Option<PrimaryKey> {
    if pk_columns.is_empty() {
        return None;
    }

    pk_columns
        .iter()
        .map(|column| row.get(column).filter(|value| !value.is_null()).cloned())
        .collect::<Option<Vec<_>>>()
        .map(PrimaryKey)
}

/// First key column that `row` cannot supply, if any.
#[must_use]
pub fn missing_key_column<'a>(pk_columns: &'a [String], row: &Row) -> Option<&'a str> {
    pk_columns
        .iter()
        .find(|column| row.get(column.as_str()).is_none_or(Value::is_null))
        .map(String::as_str)
}

/// True iff every key column has a defined, equal value in both rows.
#[must_use]
pub fn identity_equals(pk_columns: &[String], a: &Row, b: &Row) -> bool {
    match (extract_key(pk_columns, a), extract_key(pk_columns, b)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

///
/// KeyIndex
///
/// Key → position lookup over a row sequence, built once per entry so
/// bulk operations avoid pairwise identity checks. Rows without a
/// complete key are not indexed.
///

#[derive(Clone, Debug, Default)]
pub struct KeyIndex {
    positions: BTreeMap<PrimaryKey, usize>,
}

impl KeyIndex {
    /// Index `rows`; the first occurrence of a key wins.
    #[must_use]
    pub fn build<'a>(pk_columns: &[String], rows: impl IntoIterator<Item = &'a Row>) -> Self {
        let mut positions = BTreeMap::new();
        for (position, row) in rows.into_iter().enumerate() {
            if let Some(key) = extract_key(pk_columns, row) {
                positions.entry(key).or_insert(position);
            }
        }

        Self { positions }
    }

    #[must_use]
    pub fn position(&self, key: &PrimaryKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    #[must_use]
    pub fn contains(&self, key: &PrimaryKey) -> bool {
        self.positions.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PrimaryKey> {
        self.positions.keys()
    }
}
