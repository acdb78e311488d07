use crate::{
    query::{OrderTerm, SortDirection},
    row::{FieldPresence, Row},
    value::{Value, canonical_cmp, strict_order_cmp},
};
use std::cmp::Ordering;

///
/// MissingOrderColumn
///
/// A row does not carry a column the entry is ordered by, so its
/// position cannot be computed.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) struct MissingOrderColumn(pub(super) String);

/// Compare two rows under ORDER BY semantics.
///
/// ASC sorts NULLS LAST and DESC sorts NULLS FIRST unless a term says
/// otherwise. Values without a strict ordering fall back to the canonical
/// order so placement stays deterministic.
pub(super) fn compare_rows(
    order: &[OrderTerm],
    a: &Row,
    b: &Row,
) -> Result<Ordering, MissingOrderColumn> {
    for term in order {
        let path = term.path();
        let (FieldPresence::Present(left), FieldPresence::Present(right)) =
            (a.field(&path), b.field(&path))
        else {
            return Err(MissingOrderColumn(term.column.clone()));
        };

        let ordering = compare_term(term, &left, &right);
        if ordering != Ordering::Equal {
            return Ok(ordering);
        }
    }

    Ok(Ordering::Equal)
}

fn compare_term(term: &OrderTerm, left: &Value, right: &Value) -> Ordering {
    let nulls = if term.nulls_first() {
        Ordering::Less
    } else {
        Ordering::Greater
    };

    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => nulls,
        (false, true) => nulls.reverse(),
        (false, false) => {
            let ordering = strict_order_cmp(left, right).unwrap_or_else(|| canonical_cmp(left, right));
            match term.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        }
    }
}

/// Index at which `candidate` belongs in the already ordered `rows`.
///
/// Placement is stable: the candidate goes after every row it ties with.
pub(super) fn placement(
    order: &[OrderTerm],
    rows: &[Row],
    candidate: &Row,
) -> Result<usize, MissingOrderColumn> {
    for (index, row) in rows.iter().enumerate() {
        if compare_rows(order, candidate, row)? == Ordering::Less {
            return Ok(index);
        }
    }

    Ok(rows.len())
}

/// True when any order column differs between two versions of a row.
pub(super) fn order_changed(order: &[OrderTerm], before: &Row, after: &Row) -> bool {
    order.iter().any(|term| {
        let path = term.path();
        before.field(&path) != after.field(&path)
    })
}

///
/// TESTS
///
