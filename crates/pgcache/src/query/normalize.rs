use crate::{
    query::{Filter, FilterClause, NullsOrder, OrderTerm, QueryDescriptor},
    value::Value,
};

///
/// Normalize a descriptor into its canonical, deterministic form.
///
/// Normalization guarantees:
/// - Logical equivalence is preserved
/// - Nested AND groups are flattened into the top-level conjunction
/// - Nested groups of the same kind are flattened; single-child groups unwrap
/// - Conjuncts, disjuncts, and set-valued literals are sorted and deduplicated
/// - Order terms carry an explicit NULLS clause only when it differs from
///   the direction's default
///
/// Queries that differ only in clause order therefore normalize to equal
/// descriptors and encode to the same cache key.
///
#[must_use]
pub fn normalize(descriptor: &QueryDescriptor) -> QueryDescriptor {
    let mut normalized = descriptor.clone();

    let mut conjuncts = Vec::with_capacity(descriptor.filters.len());
    for filter in &descriptor.filters {
        push_flattened(&mut conjuncts, normalize_filter(filter), GroupKind::And);
    }
    conjuncts.sort();
    conjuncts.dedup();
    normalized.filters = conjuncts;

    normalized.order = descriptor.order.iter().map(normalize_order).collect();

    normalized
}

#[derive(Clone, Copy, Eq, PartialEq)]
enum GroupKind {
    And,
    Or,
}

fn normalize_filter(filter: &Filter) -> Filter {
    match filter {
        Filter::Clause(clause) => Filter::Clause(normalize_clause(clause)),
        Filter::And(children) => normalize_group(children, GroupKind::And),
        Filter::Or(children) => normalize_group(children, GroupKind::Or),
    }
}

fn normalize_group(children: &[Filter], kind: GroupKind) -> Filter {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        push_flattened(&mut flat, normalize_filter(child), kind);
    }
    flat.sort();
    flat.dedup();

    if flat.len() == 1 {
        return flat.remove(0);
    }

    match kind {
        GroupKind::And => Filter::And(flat),
        GroupKind::Or => Filter::Or(flat),
    }
}

// Inline children of a group that has the same kind as its parent.
fn push_flattened(out: &mut Vec<Filter>, filter: Filter, parent: GroupKind) {
    match (filter, parent) {
        (Filter::And(children), GroupKind::And) | (Filter::Or(children), GroupKind::Or) => {
            out.extend(children);
        }
        (filter, _) => out.push(filter),
    }
}

// Set-valued literals (`in`, `cs`, `cd` arrays) are order-insensitive.
fn normalize_clause(clause: &FilterClause) -> FilterClause {
    let mut clause = clause.clone();
    if clause.op.takes_list()
        && let Value::List(items) = &mut clause.value
    {
        items.sort();
        items.dedup();
    }

    clause
}

fn normalize_order(term: &OrderTerm) -> OrderTerm {
    let mut term = term.clone();
    if let Some(nulls) = term.nulls {
        let explicit_first = nulls == NullsOrder::First;
        term.nulls = None;
        if term.nulls_first() != explicit_first {
            term.nulls = Some(nulls);
        }
    }

    term
}
