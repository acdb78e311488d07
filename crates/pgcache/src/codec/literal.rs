//! Filter literal grammar.
//!
//! Scalars are written bare (`5`, `1.5`, `true`, `null`, `ada`) unless a bare
//! rendering would read back as a different value or collide with list
//! syntax, in which case they are double-quoted with `\` escapes.
//! Lists are `(a,b)` for `in` and `{a,b}` for containment; containment
//! also accepts JSON objects and range literals such as `[1,10)`.

use crate::{codec::DecodeError, query::FilterOp, value::Value};

// Characters that force quoting of a text scalar.
const STRUCTURAL: &[char] = &[',', '(', ')', '{', '}', '[', ']', '"', '\\'];

///
/// Rendering
///

#[must_use]
pub(crate) fn render_literal(op: FilterOp, value: &Value) -> String {
    match (op, value) {
        (FilterOp::In, Value::List(items)) => format!("({})", render_items(items)),
        (FilterOp::Contains | FilterOp::ContainedBy, Value::List(items)) => {
            format!("{{{}}}", render_items(items))
        }
        (FilterOp::Contains | FilterOp::ContainedBy, Value::Map(_)) => {
            serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
        }
        (FilterOp::Contains | FilterOp::ContainedBy, Value::Text(text)) if is_range_literal(text) => {
            text.clone()
        }
        _ => render_scalar(value),
    }
}

fn render_items(items: &[Value]) -> String {
    items.iter().map(render_scalar).collect::<Vec<_>>().join(",")
}

#[must_use]
pub(crate) fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Int(int) => int.to_string(),
        // Debug keeps a fractional marker (`2.0`) so floats read back as floats.
        Value::Float(float) => format!("{float:?}"),
        Value::Text(text) => render_text(text),
        Value::List(_) | Value::Map(_) => {
            render_text(&serde_json::to_string(value).unwrap_or_default())
        }
    }
}

fn render_text(text: &str) -> String {
    let bare_is_faithful = !text.is_empty()
        && !text.contains(STRUCTURAL)
        && matches!(parse_bare(text), Value::Text(ref parsed) if parsed == text);

    if bare_is_faithful {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');

    out
}

///
/// Parsing
///

pub(crate) fn parse_literal(op: FilterOp, raw: &str) -> Result<Value, DecodeError> {
    let invalid = || DecodeError::InvalidLiteral {
        op,
        literal: raw.to_string(),
    };

    match op {
        FilterOp::In => {
            let inner = raw
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(invalid)?;
            parse_items(inner).map(Value::List).map_err(|()| invalid())
        }
        FilterOp::Contains | FilterOp::ContainedBy => {
            if raw.starts_with('{') {
                if let Ok(value @ Value::Map(_)) = serde_json::from_str::<Value>(raw) {
                    return Ok(value);
                }
                let inner = raw
                    .strip_prefix('{')
                    .and_then(|rest| rest.strip_suffix('}'))
                    .ok_or_else(invalid)?;
                return parse_items(inner).map(Value::List).map_err(|()| invalid());
            }
            if is_range_literal(raw) {
                return Ok(Value::Text(raw.to_string()));
            }
            if raw.starts_with('"') {
                return parse_scalar(raw).map_err(|()| invalid());
            }

            Err(invalid())
        }
        FilterOp::Is => match raw {
            "null" => Ok(Value::Null),
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        _ => parse_scalar(raw).map_err(|()| invalid()),
    }
}

fn parse_items(inner: &str) -> Result<Vec<Value>, ()> {
    if inner.is_empty() {
        return Ok(Vec::new());
    }

    split_top_level(inner, ',')
        .into_iter()
        .map(parse_scalar)
        .collect()
}

pub(crate) fn parse_scalar(raw: &str) -> Result<Value, ()> {
    let Some(body) = raw.strip_prefix('"') else {
        return Ok(parse_bare(raw));
    };

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push(chars.next().ok_or(())?),
            '"' => {
                // The closing quote must end the literal.
                return if chars.as_str().is_empty() {
                    Ok(Value::Text(out))
                } else {
                    Err(())
                };
            }
            _ => out.push(ch),
        }
    }

    Err(())
}

fn parse_bare(raw: &str) -> Value {
    match raw {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if let Ok(int) = raw.parse::<i64>() {
        return Value::Int(int);
    }
    if looks_numeric(raw)
        && let Ok(float) = raw.parse::<f64>()
    {
        return Value::Float(float);
    }

    Value::Text(raw.to_string())
}

// Restrict float parsing to decimal/scientific notation (no `inf` / `NaN`).
fn looks_numeric(raw: &str) -> bool {
    raw.bytes().any(|b| b.is_ascii_digit())
        && raw
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
}

/// `[lo,hi)`-style range literal.
#[must_use]
pub(crate) fn is_range_literal(raw: &str) -> bool {
    (raw.starts_with('[') || raw.starts_with('('))
        && (raw.ends_with(']') || raw.ends_with(')'))
        && raw.contains(',')
}

/// Split on `sep` outside quotes, parentheses, braces, and brackets.
#[must_use]
pub(crate) fn split_top_level(raw: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (idx, ch) in raw.char_indices() {
        if in_quotes {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_quotes = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => depth = depth.saturating_sub(1),
            _ if ch == sep && depth == 0 => {
                parts.push(&raw[start..idx]);
                start = idx + ch.len_utf8();
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
