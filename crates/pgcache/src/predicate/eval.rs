use crate::{
    predicate::{
        coercion::{OrderOutcome, compare_eq, compare_order, families},
        pattern::like,
        range::NumericRange,
    },
    query::{Filter, FilterClause, FilterOp},
    row::{FieldPresence, Row},
    value::{Value, ValueFamily},
};
use std::cmp::Ordering;
use thiserror::Error as ThisError;

///
/// EvalError
///
/// A clause that cannot be decided against a row. The mutation engine
/// treats either variant as "cannot patch this entry".
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum EvalError {
    #[error("column '{column}' is not present on the row")]
    MissingColumn { column: String },

    #[error("'{op}' on column '{column}' cannot compare {actual} with {literal}")]
    TypeMismatch {
        column: String,
        op: FilterOp,
        actual: ValueFamily,
        literal: ValueFamily,
    },
}

///
/// Evaluate a top-level conjunction of filters against a row.
///
/// Only a definite `true` admits the row; SQL `unknown` (NULL operands)
/// rejects it just like `false`.
///
pub fn matches(filters: &[Filter], row: &Row) -> Result<bool, EvalError> {
    Ok(eval_all(filters, row)? == Some(true))
}

/// Three-valued evaluation of a single filter; `None` is SQL `unknown`.
pub fn eval_filter(filter: &Filter, row: &Row) -> Result<Option<bool>, EvalError> {
    match filter {
        Filter::Clause(clause) => eval_clause(clause, row),
        Filter::And(children) => eval_all(children, row),
        Filter::Or(children) => eval_any(children, row),
    }
}

fn eval_all(filters: &[Filter], row: &Row) -> Result<Option<bool>, EvalError> {
    let mut unknown = false;
    for filter in filters {
        match eval_filter(filter, row)? {
            Some(false) => return Ok(Some(false)),
            None => unknown = true,
            Some(true) => {}
        }
    }

    Ok(if unknown { None } else { Some(true) })
}

fn eval_any(filters: &[Filter], row: &Row) -> Result<Option<bool>, EvalError> {
    let mut unknown = false;
    for filter in filters {
        match eval_filter(filter, row)? {
            Some(true) => return Ok(Some(true)),
            None => unknown = true,
            Some(false) => {}
        }
    }

    Ok(if unknown { None } else { Some(false) })
}

///
/// Evaluate one `column [not.]op.value` clause.
///
/// `not.` inverts a definite outcome and keeps `unknown` unknown.
///
fn eval_clause(clause: &FilterClause, row: &Row) -> Result<Option<bool>, EvalError> {
    let FieldPresence::Present(actual) = row.field(&clause.path()) else {
        return Err(EvalError::MissingColumn {
            column: clause.column.clone(),
        });
    };
    let literal = &clause.value;

    let outcome = match clause.op {
        FilterOp::Eq => compare_eq(&actual, literal),
        FilterOp::Neq => compare_eq(&actual, literal).map(|equal| !equal),

        FilterOp::Gt => ordered(clause, &actual, Ordering::is_gt)?,
        FilterOp::Gte => ordered(clause, &actual, Ordering::is_ge)?,
        FilterOp::Lt => ordered(clause, &actual, Ordering::is_lt)?,
        FilterOp::Lte => ordered(clause, &actual, Ordering::is_le)?,

        FilterOp::Like => pattern(clause, &actual, false)?,
        FilterOp::Ilike => pattern(clause, &actual, true)?,

        // IS never yields unknown.
        FilterOp::Is => Some(match literal {
            Value::Null => actual.is_null(),
            Value::Bool(flag) => matches!(actual, Value::Bool(value) if value == *flag),
            _ => return Err(mismatch(clause, &actual)),
        }),

        FilterOp::In => in_list(clause, &actual)?,

        FilterOp::Contains => containment(clause, &actual, literal, &actual)?,
        FilterOp::ContainedBy => containment(clause, &actual, &actual, literal)?,
    };

    Ok(if clause.negated {
        outcome.map(|value| !value)
    } else {
        outcome
    })
}

fn mismatch(clause: &FilterClause, actual: &Value) -> EvalError {
    let (actual, literal) = families(actual, &clause.value);

    EvalError::TypeMismatch {
        column: clause.column.clone(),
        op: clause.op,
        actual,
        literal,
    }
}

fn ordered(
    clause: &FilterClause,
    actual: &Value,
    accept: fn(Ordering) -> bool,
) -> Result<Option<bool>, EvalError> {
    match compare_order(actual, &clause.value) {
        OrderOutcome::Ordered(ordering) => Ok(Some(accept(ordering))),
        OrderOutcome::Unknown => Ok(None),
        OrderOutcome::Undefined => Err(mismatch(clause, actual)),
    }
}

fn pattern(
    clause: &FilterClause,
    actual: &Value,
    case_insensitive: bool,
) -> Result<Option<bool>, EvalError> {
    if actual.is_null() || clause.value.is_null() {
        return Ok(None);
    }
    // Bare numeric patterns decode as numbers; LIKE always reads them as text.
    let (Value::Text(text), Some(pattern)) = (actual, clause.value.render_text()) else {
        return Err(mismatch(clause, actual));
    };

    Ok(Some(like(text, &pattern, case_insensitive)))
}

// SQL `IN`: true on any match, unknown if no match but a NULL was compared.
fn in_list(clause: &FilterClause, actual: &Value) -> Result<Option<bool>, EvalError> {
    let Value::List(items) = &clause.value else {
        return Err(mismatch(clause, actual));
    };
    if actual.is_null() {
        return Ok(None);
    }

    let mut unknown = false;
    for item in items {
        match compare_eq(actual, item) {
            Some(true) => return Ok(Some(true)),
            Some(false) => {}
            None => unknown = true,
        }
    }

    Ok(if unknown { None } else { Some(false) })
}

///
/// `container @> contained` for arrays, JSON objects, and numeric ranges.
///
/// `cs` passes (row, literal); `cd` passes (literal, row).
///
fn containment(
    clause: &FilterClause,
    actual: &Value,
    container: &Value,
    contained: &Value,
) -> Result<Option<bool>, EvalError> {
    if container.is_null() || contained.is_null() {
        return Ok(None);
    }

    match (container, contained) {
        (Value::List(outer), Value::List(inner)) => {
            if !outer.iter().chain(inner).all(Value::is_scalar) {
                return Err(mismatch(clause, actual));
            }
            Ok(Some(inner.iter().all(|item| {
                outer
                    .iter()
                    .any(|candidate| compare_eq(candidate, item) == Some(true))
            })))
        }
        (Value::Map(_), Value::Map(_)) => Ok(Some(json_contains(container, contained))),
        (Value::Text(outer), Value::Text(inner)) => {
            match (NumericRange::parse(outer), NumericRange::parse(inner)) {
                (Some(outer), Some(inner)) => Ok(Some(outer.contains_range(&inner))),
                _ => Err(mismatch(clause, actual)),
            }
        }
        _ => Err(mismatch(clause, actual)),
    }
}

// jsonb containment: objects by key subset, arrays by element subset,
// scalars by equality.
fn json_contains(container: &Value, contained: &Value) -> bool {
    match (container, contained) {
        (Value::Map(outer), Value::Map(inner)) => inner.iter().all(|(key, value)| {
            outer
                .get(key)
                .is_some_and(|candidate| json_contains(candidate, value))
        }),
        (Value::List(outer), Value::List(inner)) => inner
            .iter()
            .all(|item| outer.iter().any(|candidate| json_contains(candidate, item))),
        (Value::List(outer), scalar) if scalar.is_scalar() => outer.contains(scalar),
        _ => container == contained && container.family() == contained.family(),
    }
}
