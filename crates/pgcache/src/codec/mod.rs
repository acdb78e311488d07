//! Cache key codec.
//!
//! A key is seven `$`-separated segments:
//!
//! ```text
//! {prefix}${schema}${table}${query}$count={mode|null}$head={bool}${cardinality}
//! ```
//!
//! The query segment is a PostgREST query string rendered from the
//! normalized descriptor, so logically equivalent queries share a key.
//! Parameter names `select`, `order`, `offset`, `limit`, `or` and `and`
//! are reserved; every other parameter is a column filter. A filter on a
//! column with a reserved name is written as a one-item `and=(...)` group.

mod escape;
mod literal;

#[cfg(test)]
mod tests;

use crate::query::{
    Cardinality, CountMode, Filter, FilterClause, FilterOp, NullsOrder, OrderTerm, QueryDescriptor,
    Range, Selection, SortDirection, normalize,
};
use escape::{escape, unescape};
use literal::{parse_literal, render_literal, split_top_level};
use thiserror::Error as ThisError;

/// Prefix used by [`KeyCodec::default`].
pub const DEFAULT_PREFIX: &str = "postgrest";

const RESERVED_PARAMS: [&str; 6] = ["and", "limit", "offset", "or", "order", "select"];

///
/// DecodeError
///
/// A key that this codec did not produce, or that was corrupted.
/// The mutation engine treats every variant as a foreign key and skips it.
///

#[remain::sorted]
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum DecodeError {
    #[error("key does not start with the codec prefix")]
    Foreign,

    #[error("invalid percent escape at byte {position}")]
    InvalidEscape { position: usize },

    #[error("invalid literal for operator '{op}': {literal}")]
    InvalidLiteral { op: FilterOp, literal: String },

    #[error("invalid value for '{param}': {value}")]
    InvalidParam { param: String, value: String },

    #[error("escaped key is not valid UTF-8")]
    InvalidUtf8,

    #[error("malformed filter: {0}")]
    MalformedFilter(String),

    #[error("unknown filter operator: {0}")]
    UnknownOperator(String),

    #[error("expected 7 key segments, found {0}")]
    WrongSegmentCount(usize),
}

///
/// KeyCodec
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyCodec {
    prefix: String,
}

impl KeyCodec {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Encode a descriptor into its canonical cache key.
    #[must_use]
    pub fn encode(&self, descriptor: &QueryDescriptor) -> String {
        let descriptor = normalize(descriptor);
        let count = descriptor.count.map_or("null", CountMode::as_str);

        [
            escape(&self.prefix),
            escape(&descriptor.schema),
            escape(&descriptor.table),
            encode_query(&descriptor),
            format!("count={count}"),
            format!("head={}", descriptor.is_head),
            descriptor.cardinality.as_str().to_string(),
        ]
        .join("$")
    }

    /// Decode a key produced by [`Self::encode`] into a normalized descriptor.
    pub fn decode(&self, key: &str) -> Result<QueryDescriptor, DecodeError> {
        let segments: Vec<&str> = key.split('$').collect();
        let owned = segments
            .first()
            .is_some_and(|prefix| unescape(prefix).as_deref() == Ok(self.prefix.as_str()));
        if !owned {
            return Err(DecodeError::Foreign);
        }
        let [_, schema, table, query, count, head, cardinality] = segments[..] else {
            return Err(DecodeError::WrongSegmentCount(segments.len()));
        };

        let mut descriptor = QueryDescriptor::new(unescape(table)?);
        descriptor.schema = unescape(schema)?;
        descriptor.count = match flag_value(count, "count")? {
            "null" => None,
            mode => Some(CountMode::parse(mode).ok_or_else(|| invalid_param("count", mode))?),
        };
        descriptor.is_head = match flag_value(head, "head")? {
            "true" => true,
            "false" => false,
            other => return Err(invalid_param("head", other)),
        };
        descriptor.cardinality = Cardinality::parse(cardinality)
            .ok_or_else(|| invalid_param("cardinality", cardinality))?;

        decode_query(query, &mut descriptor)?;

        Ok(normalize(&descriptor))
    }
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

/// Encode with the default prefix.
#[must_use]
pub fn encode(descriptor: &QueryDescriptor) -> String {
    KeyCodec::default().encode(descriptor)
}

/// Decode with the default prefix.
pub fn decode(key: &str) -> Result<QueryDescriptor, DecodeError> {
    KeyCodec::default().decode(key)
}

fn invalid_param(param: &str, value: &str) -> DecodeError {
    DecodeError::InvalidParam {
        param: param.to_string(),
        value: value.to_string(),
    }
}

fn flag_value<'a>(segment: &'a str, name: &str) -> Result<&'a str, DecodeError> {
    segment
        .split_once('=')
        .filter(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .ok_or_else(|| invalid_param(name, segment))
}

///
/// Query segment: encoding
///

fn encode_query(descriptor: &QueryDescriptor) -> String {
    let mut params = vec![param("select", &descriptor.fields.to_string())];

    for filter in &descriptor.filters {
        params.push(match filter {
            Filter::Clause(clause) if RESERVED_PARAMS.contains(&clause.column.as_str()) => {
                param("and", &render_group_body(std::slice::from_ref(filter)))
            }
            Filter::Clause(clause) => param(&clause.column, &render_clause_value(clause)),
            Filter::And(children) => param("and", &render_group_body(children)),
            Filter::Or(children) => param("or", &render_group_body(children)),
        });
    }

    if descriptor.is_ordered() {
        let order: Vec<String> = descriptor.order.iter().map(render_order).collect();
        params.push(param("order", &order.join(",")));
    }

    if let Some(range) = descriptor.range {
        params.push(param("offset", &range.offset.to_string()));
        params.push(param("limit", &range.limit.to_string()));
    }

    params.join("&")
}

fn param(name: &str, value: &str) -> String {
    format!("{}={}", escape(name), escape(value))
}

// `[not.]op.literal`
fn render_clause_value(clause: &FilterClause) -> String {
    let not = if clause.negated { "not." } else { "" };

    format!("{not}{}.{}", clause.op, render_literal(clause.op, &clause.value))
}

fn render_group_body(children: &[Filter]) -> String {
    let items: Vec<String> = children.iter().map(render_group_item).collect();

    format!("({})", items.join(","))
}

fn render_group_item(filter: &Filter) -> String {
    match filter {
        Filter::Clause(clause) => format!("{}.{}", clause.column, render_clause_value(clause)),
        Filter::And(children) => format!("and{}", render_group_body(children)),
        Filter::Or(children) => format!("or{}", render_group_body(children)),
    }
}

fn render_order(term: &OrderTerm) -> String {
    let direction = match term.direction {
        SortDirection::Asc => "asc",
        SortDirection::Desc => "desc",
    };
    let nulls = match term.nulls {
        Some(NullsOrder::First) => ".nullsfirst",
        Some(NullsOrder::Last) => ".nullslast",
        None => "",
    };

    format!("{}.{direction}{nulls}", term.column)
}

///
/// Query segment: decoding
///

fn decode_query(query: &str, descriptor: &mut QueryDescriptor) -> Result<(), DecodeError> {
    let mut offset = None;
    let mut limit = None;

    for part in query.split('&').filter(|part| !part.is_empty()) {
        let (name, value) = part
            .split_once('=')
            .ok_or_else(|| invalid_param(part, ""))?;
        let name = unescape(name)?;
        let value = unescape(value)?;

        match name.as_str() {
            "select" => descriptor.fields = Selection::parse(&value),
            "order" => descriptor.order = parse_order(&value)?,
            "offset" => offset = Some(parse_number("offset", &value)?),
            "limit" => limit = Some(parse_number("limit", &value)?),
            "and" => descriptor.filters.push(Filter::And(parse_group_body(&value)?)),
            "or" => descriptor.filters.push(Filter::Or(parse_group_body(&value)?)),
            _ => descriptor
                .filters
                .push(Filter::Clause(parse_clause_value(name, &value)?)),
        }
    }

    descriptor.range = match (offset, limit) {
        (_, Some(0)) => return Err(invalid_param("limit", "0")),
        (offset, Some(limit)) => Some(Range {
            offset: offset.unwrap_or(0),
            limit,
        }),
        (Some(offset), None) => return Err(invalid_param("offset", &offset.to_string())),
        (None, None) => None,
    };

    Ok(())
}

fn parse_number(param: &str, value: &str) -> Result<u64, DecodeError> {
    value.parse().map_err(|_| invalid_param(param, value))
}

// `[not.]op.literal` for a known column.
fn parse_clause_value(column: String, raw: &str) -> Result<FilterClause, DecodeError> {
    let (negated, rest) = match raw.strip_prefix("not.") {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let (keyword, literal) = rest
        .split_once('.')
        .ok_or_else(|| DecodeError::MalformedFilter(raw.to_string()))?;
    let op = FilterOp::parse(keyword)
        .ok_or_else(|| DecodeError::UnknownOperator(keyword.to_string()))?;

    Ok(FilterClause {
        column,
        op,
        negated,
        value: parse_literal(op, literal)?,
    })
}

fn parse_group_body(raw: &str) -> Result<Vec<Filter>, DecodeError> {
    let inner = raw
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .filter(|inner| !inner.is_empty())
        .ok_or_else(|| DecodeError::MalformedFilter(raw.to_string()))?;

    split_top_level(inner, ',')
        .into_iter()
        .map(parse_group_item)
        .collect()
}

fn parse_group_item(raw: &str) -> Result<Filter, DecodeError> {
    if let Some(body) = raw.strip_prefix("and(") {
        return parse_group_body(&format!("({body}")).map(Filter::And);
    }
    if let Some(body) = raw.strip_prefix("or(") {
        return parse_group_body(&format!("({body}")).map(Filter::Or);
    }

    // `column.[not.]op.literal`; the column may itself contain dots, so the
    // operator is the first later segment that is `not` or a keyword.
    let segments: Vec<&str> = raw.split('.').collect();
    let op_index = (1..segments.len())
        .find(|&idx| segments[idx] == "not" || FilterOp::parse(segments[idx]).is_some())
        .ok_or_else(|| DecodeError::MalformedFilter(raw.to_string()))?;
    let column = segments[..op_index].join(".");
    let rest = segments[op_index..].join(".");

    parse_clause_value(column, &rest).map(Filter::Clause)
}

fn parse_order(raw: &str) -> Result<Vec<OrderTerm>, DecodeError> {
    split_top_level(raw, ',')
        .into_iter()
        .map(|term| {
            let (term, nulls) = if let Some(head) = term.strip_suffix(".nullsfirst") {
                (head, Some(NullsOrder::First))
            } else if let Some(head) = term.strip_suffix(".nullslast") {
                (head, Some(NullsOrder::Last))
            } else {
                (term, None)
            };
            let (column, direction) = if let Some(head) = term.strip_suffix(".desc") {
                (head, SortDirection::Desc)
            } else {
                (term.strip_suffix(".asc").unwrap_or(term), SortDirection::Asc)
            };
            if column.is_empty() {
                return Err(invalid_param("order", raw));
            }

            Ok(OrderTerm {
                column: column.to_string(),
                direction,
                nulls,
            })
        })
        .collect()
}
