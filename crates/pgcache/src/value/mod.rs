mod compare;


use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, fmt};

// re-exports
pub use compare::{canonical_cmp, strict_order_cmp};

///
/// Value
///
/// JSON-shaped runtime value carried by rows and filter literals.
///
/// Null  → SQL NULL / JSON null.
/// Int and Float share the numeric family and compare with widening.
/// Map   → JSON object (embedded resource or json/jsonb column).
///

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Self>),
    Map(BTreeMap<String, Self>),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub const fn family(&self) -> ValueFamily {
        match self {
            Self::Null => ValueFamily::Null,
            Self::Bool(_) => ValueFamily::Bool,
            Self::Int(_) | Self::Float(_) => ValueFamily::Numeric,
            Self::Text(_) => ValueFamily::Text,
            Self::List(_) => ValueFamily::List,
            Self::Map(_) => ValueFamily::Map,
        }
    }

    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Map(_))
    }

    /// Render a value the way PostgreSQL renders it as text (`->>`, `::text`).
    ///
    /// Returns `None` for NULL, which has no textual rendering.
    #[must_use]
    pub fn render_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(text) => Some(text.clone()),
            Self::Bool(value) => Some(value.to_string()),
            Self::Int(value) => Some(value.to_string()),
            Self::Float(value) => Some(value.to_string()),
            Self::List(_) | Self::Map(_) => serde_json::to_string(self).ok(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        canonical_cmp(self, other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        canonical_cmp(self, other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render_text() {
            Some(text) => write!(f, "{text}"),
            None => write!(f, "null"),
        }
    }
}

///
/// ValueFamily
///
/// Comparison family of a value. Ordered comparisons are only defined
/// between values of the same family.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueFamily {
    Null,
    Bool,
    Numeric,
    Text,
    List,
    Map,
}

impl fmt::Display for ValueFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Numeric => "numeric",
            Self::Text => "text",
            Self::List => "list",
            Self::Map => "map",
        };
        write!(f, "{label}")
    }
}

///
/// Conversions
///

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
