//! Rows as cached by the client: an ordered column map with path lookup
//! and the right-biased merge used by update mutations.

use crate::value::Value;
use derive_more::{Deref, DerefMut, IntoIterator};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

///
/// Row
///
/// Mapping from column name to value. A column absent from the map is
/// "not provided"; a column mapped to `Value::Null` is explicitly null.
///

#[derive(Clone, Debug, Default, Deref, DerefMut, Deserialize, Eq, IntoIterator, PartialEq, Serialize)]
#[into_iterator(owned, ref)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style column assignment.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    /// Resolve a (possibly nested) column path against this row.
    #[must_use]
    pub fn field(&self, path: &FieldPath) -> FieldPresence {
        let Some(mut current) = self.0.get(&path.root) else {
            return FieldPresence::Missing;
        };

        for (index, step) in path.steps.iter().enumerate() {
            let last = index + 1 == path.steps.len();
            match step {
                PathStep::Embedded(key) => match current {
                    Value::Map(map) => match map.get(key) {
                        Some(next) => current = next,
                        None => return FieldPresence::Missing,
                    },
                    // A null embedded resource makes every nested column null.
                    Value::Null => return FieldPresence::Present(Value::Null),
                    _ => return FieldPresence::Missing,
                },
                PathStep::Json(key) | PathStep::JsonText(key) => {
                    let Some(next) = json_step(current, key) else {
                        return FieldPresence::Present(Value::Null);
                    };
                    if last && matches!(step, PathStep::JsonText(_)) {
                        return FieldPresence::Present(
                            next.render_text().map_or(Value::Null, Value::Text),
                        );
                    }
                    current = next;
                }
            }
        }

        FieldPresence::Present(current.clone())
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(column, value)| (column.into(), value.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, Value>> for Row {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

// One `->` / `->>` navigation step; `None` where PostgreSQL yields NULL.
fn json_step<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Map(map) => map.get(key),
        Value::List(items) => key.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    }
}

/// Right-biased shallow merge: every column present in `payload` overwrites
/// the existing column (explicit nulls included); absent columns are kept.
#[must_use]
pub fn merge(existing: &Row, payload: &Row) -> Row {
    let mut merged = existing.clone();
    for (column, value) in payload.iter() {
        merged.insert(column.clone(), value.clone());
    }

    merged
}

///
/// FieldPresence
///
/// Result of reading a path from a row. Distinguishes a column the row
/// does not carry from a column whose value is NULL.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldPresence {
    Present(Value),
    Missing,
}

///
/// FieldPath
///
/// Parsed column reference: a root column plus embedded-resource (`.`)
/// or JSON (`->`, `->>`) navigation steps.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FieldPath {
    root: String,
    steps: Vec<PathStep>,
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
enum PathStep {
    Embedded(String),
    Json(String),
    JsonText(String),
}

impl FieldPath {
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let (root, mut rest) = split_step(path);
        let mut steps = Vec::new();

        while !rest.is_empty() {
            let (step, remaining) = if let Some(tail) = rest.strip_prefix("->>") {
                let (key, remaining) = split_step(tail);
                (PathStep::JsonText(key.to_string()), remaining)
            } else if let Some(tail) = rest.strip_prefix("->") {
                let (key, remaining) = split_step(tail);
                (PathStep::Json(key.to_string()), remaining)
            } else {
                let tail = rest.strip_prefix('.').unwrap_or(rest);
                let (key, remaining) = split_step(tail);
                (PathStep::Embedded(key.to_string()), remaining)
            };
            steps.push(step);
            rest = remaining;
        }

        Self {
            root: root.to_string(),
            steps,
        }
    }

    /// Top-level column the path starts from.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    #[must_use]
    pub const fn is_nested(&self) -> bool {
        !self.steps.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for step in &self.steps {
            match step {
                PathStep::Embedded(key) => write!(f, ".{key}")?,
                PathStep::Json(key) => write!(f, "->{key}")?,
                PathStep::JsonText(key) => write!(f, "->>{key}")?,
            }
        }

        Ok(())
    }
}

// Split at the next path separator (`.` or `->`).
fn split_step(path: &str) -> (&str, &str) {
    let dot = path.find('.');
    let arrow = path.find("->");
    let cut = match (dot, arrow) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    match cut {
        Some(idx) => path.split_at(idx),
        None => (path, ""),
    }
}

///
/// TESTS
///
