use crate::value::Value;
use std::{cmp::Ordering, collections::BTreeMap};

/// Total canonical comparator used for key normalization and identity.
///
/// Ordering rules:
/// 1. Canonical family rank (null < bool < numeric < text < list < map)
/// 2. Family-specific comparison for same-ranked values
///
/// Int and Float compare numerically, so `1` and `1.0` are equal.
#[must_use]
pub fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    let rank = canonical_rank(left).cmp(&canonical_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }

    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::List(a), Value::List(b)) => canonical_cmp_list(a, b),
        (Value::Map(a), Value::Map(b)) => canonical_cmp_map(a, b),
        _ => numeric_cmp(left, right).unwrap_or(Ordering::Equal),
    }
}

/// Strict comparator for orderable values of the same family.
///
/// Returns `None` for NULL operands, mismatched families, and maps.
#[must_use]
pub fn strict_order_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::List(a), Value::List(b)) => strict_order_list(a, b),
        _ => numeric_cmp(left, right),
    }
}

const fn canonical_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::Text(_) => 3,
        Value::List(_) => 4,
        Value::Map(_) => 5,
    }
}

// Numeric comparison with int/float widening; `None` outside the numeric family.
fn numeric_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => Some(a.total_cmp(b)),
        (Value::Int(a), Value::Float(b)) => Some(cmp_int_float(*a, *b)),
        (Value::Float(a), Value::Int(b)) => Some(cmp_int_float(*b, *a).reverse()),
        _ => None,
    }
}

// Exact int/float comparison without routing the integer through f64.
#[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn cmp_int_float(int: i64, float: f64) -> Ordering {
    const BOUND: f64 = i64::MAX as f64;

    if float.is_nan() {
        return if float.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if float >= BOUND {
        return Ordering::Less;
    }
    if float < -BOUND {
        return Ordering::Greater;
    }

    let whole = float.trunc();
    match int.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.total_cmp(&(float - whole)),
        other => other,
    }
}

fn canonical_cmp_list(left: &[Value], right: &[Value]) -> Ordering {
    for (left, right) in left.iter().zip(right.iter()) {
        let cmp = canonical_cmp(left, right);
        if cmp != Ordering::Equal {
            return cmp;
        }
    }

    left.len().cmp(&right.len())
}

fn canonical_cmp_map(left: &BTreeMap<String, Value>, right: &BTreeMap<String, Value>) -> Ordering {
    for ((left_key, left_value), (right_key, right_value)) in left.iter().zip(right.iter()) {
        let key_cmp = left_key.cmp(right_key);
        if key_cmp != Ordering::Equal {
            return key_cmp;
        }

        let value_cmp = canonical_cmp(left_value, right_value);
        if value_cmp != Ordering::Equal {
            return value_cmp;
        }
    }

    left.len().cmp(&right.len())
}

// Arrays order element-wise like PostgreSQL array comparison.
fn strict_order_list(left: &[Value], right: &[Value]) -> Option<Ordering> {
    for (left, right) in left.iter().zip(right.iter()) {
        let cmp = strict_order_cmp(left, right)?;
        if cmp != Ordering::Equal {
            return Some(cmp);
        }
    }

    Some(left.len().cmp(&right.len()))
}
