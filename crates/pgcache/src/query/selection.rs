use crate::row::Row;
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// Selection
///
/// Ordered `select=` column list. Column order is significant (it is the
/// shape of the result), so items are kept exactly as written.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Selection {
    items: Vec<SelectItem>,
}

///
/// SelectItem
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SelectItem {
    /// `*`
    Star,
    /// `column` or `alias:column`, with an optional `::cast` kept verbatim.
    Column {
        name: String,
        alias: Option<String>,
        cast: Option<String>,
    },
    /// Embedded resource such as `author:profile(name)`; carried verbatim.
    Embedded { key: String, raw: String },
}

impl SelectItem {
    /// Key under which the item appears in result rows.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Star => None,
            Self::Column { name, alias, .. } => Some(alias.as_deref().unwrap_or(name)),
            Self::Embedded { key, .. } => Some(key),
        }
    }
}

impl Selection {
    #[must_use]
    pub fn all() -> Self {
        Self {
            items: vec![SelectItem::Star],
        }
    }

    /// Parse a `select=` value. Blank input selects everything.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let items: Vec<SelectItem> = split_top_level(raw)
            .into_iter()
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(parse_item)
            .collect();

        if items.is_empty() {
            Self::all()
        } else {
            Self { items }
        }
    }

    #[must_use]
    pub fn items(&self) -> &[SelectItem] {
        &self.items
    }

    #[must_use]
    pub fn is_star(&self) -> bool {
        self.items.iter().any(|item| matches!(item, SelectItem::Star))
    }

    /// Shape `source` to this selection.
    ///
    /// Plain columns read the source column (renamed to their alias) and
    /// fall back to the existing cached row. Embedded resources are never
    /// part of mutation payloads, so they come from the existing row only.
    #[must_use]
    pub fn project(&self, source: &Row, existing: Option<&Row>) -> Row {
        let mut out = Row::new();

        for item in &self.items {
            match item {
                SelectItem::Star => {
                    for (column, value) in source.iter() {
                        out.insert(column.clone(), value.clone());
                    }
                }
                SelectItem::Column { name, .. } => {
                    let key = item.key().unwrap_or(name);
                    let value = source
                        .get(name)
                        .or_else(|| existing.and_then(|row| row.get(key)));
                    if let Some(value) = value {
                        out.insert(key.to_string(), value.clone());
                    }
                }
                SelectItem::Embedded { key, .. } => {
                    if let Some(value) = existing.and_then(|row| row.get(key)) {
                        out.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        out
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, item) in self.items.iter().enumerate() {
            if idx > 0 {
                write!(f, ",")?;
            }
            match item {
                SelectItem::Star => write!(f, "*")?,
                SelectItem::Column { name, alias, cast } => {
                    if let Some(alias) = alias {
                        write!(f, "{alias}:")?;
                    }
                    write!(f, "{name}")?;
                    if let Some(cast) = cast {
                        write!(f, "::{cast}")?;
                    }
                }
                SelectItem::Embedded { raw, .. } => write!(f, "{raw}")?,
            }
        }

        Ok(())
    }
}

fn parse_item(raw: &str) -> SelectItem {
    if raw == "*" {
        return SelectItem::Star;
    }

    if let Some(open) = raw.find('(') {
        let head = &raw[..open];
        // `alias:relation!hint(...)` → the row key is the alias, else the relation.
        let key = head
            .split_once(':')
            .map_or(head, |(alias, _)| alias)
            .split('!')
            .next()
            .unwrap_or(head)
            .trim();

        return SelectItem::Embedded {
            key: key.to_string(),
            raw: raw.to_string(),
        };
    }

    let (body, cast) = match raw.split_once("::") {
        Some((body, cast)) => (body, Some(cast.to_string())),
        None => (raw, None),
    };
    let (alias, name) = match body.split_once(':') {
        Some((alias, name)) => (Some(alias.to_string()), name),
        None => (None, body),
    };

    SelectItem::Column {
        name: name.to_string(),
        alias,
        cast,
    }
}

// Split on commas that are not nested inside parentheses.
fn split_top_level(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (idx, ch) in raw.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&raw[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);

    parts
}

///
/// TESTS
///
