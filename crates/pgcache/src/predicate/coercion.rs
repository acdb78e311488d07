use crate::value::{Value, ValueFamily, strict_order_cmp};
use std::{borrow::Cow, cmp::Ordering};

///
/// Predicate coercion and comparison semantics
///
/// PostgREST sends every literal as text and lets PostgreSQL cast it to
/// the column type. Cached rows only carry JSON shapes, so the rules are:
///
/// - a text column compares against the literal's textual rendering
/// - int and float compare with numeric widening
/// - any other cross-family comparison is undefined
///

/// Bring a scalar literal into the row value's family where PostgreSQL
/// would have cast it.
#[must_use]
pub(super) fn coerce_literal<'a>(actual: &Value, literal: &'a Value) -> Cow<'a, Value> {
    match (actual, literal) {
        (Value::Text(_), Value::Bool(_) | Value::Int(_) | Value::Float(_)) => literal
            .render_text()
            .map_or(Cow::Borrowed(literal), |text| Cow::Owned(Value::Text(text))),
        _ => Cow::Borrowed(literal),
    }
}

/// Equality under coercion; `None` when either side is NULL.
///
/// Cross-family equality is defined (and false), mirroring a failed cast
/// never matching rather than aborting the whole query.
#[must_use]
pub(super) fn compare_eq(actual: &Value, literal: &Value) -> Option<bool> {
    if actual.is_null() || literal.is_null() {
        return None;
    }

    let literal = coerce_literal(actual, literal);
    if actual.family() != literal.family() {
        return Some(false);
    }

    Some(actual == literal.as_ref())
}

///
/// OrderOutcome
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum OrderOutcome {
    Ordered(Ordering),
    Unknown,
    Undefined,
}

/// Ordered comparison under coercion.
///
/// `Unknown` for NULL operands; `Undefined` when the families do not
/// share an ordering.
#[must_use]
pub(super) fn compare_order(actual: &Value, literal: &Value) -> OrderOutcome {
    if actual.is_null() || literal.is_null() {
        return OrderOutcome::Unknown;
    }

    let literal = coerce_literal(actual, literal);
    match strict_order_cmp(actual, &literal) {
        Some(ordering) => OrderOutcome::Ordered(ordering),
        None => OrderOutcome::Undefined,
    }
}

/// Families of both operands after coercion, for error reporting.
#[must_use]
pub(super) fn families(actual: &Value, literal: &Value) -> (ValueFamily, ValueFamily) {
    (actual.family(), coerce_literal(actual, literal).family())
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_columns_compare_against_rendered_literals() {
        assert_eq!(compare_eq(&Value::from("42"), &Value::Int(42)), Some(true));
        assert_eq!(compare_eq(&Value::from("true"), &Value::Bool(true)), Some(true));
        assert_eq!(
            compare_order(&Value::from("b"), &Value::Int(1)),
            OrderOutcome::Ordered(Ordering::Greater)
        );
    }

    #[test]
    fn numeric_values_widen() {
        assert_eq!(compare_eq(&Value::Int(2), &Value::Float(2.0)), Some(true));
        assert_eq!(
            compare_order(&Value::Float(1.5), &Value::Int(2)),
            OrderOutcome::Ordered(Ordering::Less)
        );
    }

    #[test]
    fn null_operands_are_unknown() {
        assert_eq!(compare_eq(&Value::Null, &Value::Int(1)), None);
        assert_eq!(compare_eq(&Value::Int(1), &Value::Null), None);
        assert_eq!(
            compare_order(&Value::Null, &Value::Int(1)),
            OrderOutcome::Unknown
        );
    }

    #[test]
    fn cross_family_equality_is_false_and_ordering_undefined() {
        assert_eq!(compare_eq(&Value::Int(1), &Value::from("1")), Some(false));
        assert_eq!(
            compare_order(&Value::Bool(true), &Value::Int(1)),
            OrderOutcome::Undefined
        );
        assert_eq!(
            families(&Value::Bool(true), &Value::Int(1)),
            (ValueFamily::Bool, ValueFamily::Numeric)
        );
    }
}
