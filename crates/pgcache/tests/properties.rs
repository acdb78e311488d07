use pgcache::{
    cache::{CacheEntry, MemoryCache},
    codec::KeyCodec,
    identity::identity_equals,
    mutate::{MutationRequest, apply_mutation},
    query::{
        Cardinality, CountMode, Filter, FilterClause, FilterOp, OrderTerm, QueryDescriptor, Range,
        Selection, normalize,
    },
    row::Row,
    value::Value,
};
use proptest::prelude::*;
use std::collections::BTreeMap;

// ─────────────────────────────────────────────
// Strategies
// ─────────────────────────────────────────────

// Includes names that collide with reserved query parameters.
fn column() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "id", "age", "username", "team", "note", "select", "order", "offset", "limit", "and", "or",
    ])
    .prop_map(str::to_string)
}

fn text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 $&=%,()._-]{0,8}"
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        any::<bool>().prop_map(Value::Bool),
        text().prop_map(Value::Text),
    ]
}

fn clause() -> impl Strategy<Value = FilterClause> {
    let compare = (
        column(),
        prop::sample::select(vec![
            FilterOp::Eq,
            FilterOp::Neq,
            FilterOp::Gt,
            FilterOp::Gte,
            FilterOp::Lt,
            FilterOp::Lte,
        ]),
        scalar(),
    )
        .prop_map(|(column, op, value)| FilterClause::new(column, op, value));
    let pattern = (column(), "[a-z%_]{1,6}", any::<bool>()).prop_map(|(column, pattern, ci)| {
        let op = if ci { FilterOp::Ilike } else { FilterOp::Like };
        FilterClause::new(column, op, pattern)
    });
    let is = (column(), prop::option::of(any::<bool>()))
        .prop_map(|(column, value)| FilterClause::new(column, FilterOp::Is, value));
    let within = (column(), prop::collection::vec(any::<i32>(), 1..4))
        .prop_map(|(column, values)| FilterClause::new(column, FilterOp::In, values));

    (prop_oneof![compare, pattern, is, within], any::<bool>()).prop_map(|(clause, negated)| {
        if negated { clause.negate() } else { clause }
    })
}

fn filter() -> impl Strategy<Value = Filter> {
    let leaf = clause().prop_map(Filter::Clause);
    leaf.prop_recursive(2, 8, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 2..4).prop_map(Filter::Or),
            prop::collection::vec(inner, 2..4).prop_map(Filter::And),
        ]
    })
}

fn order_term() -> impl Strategy<Value = OrderTerm> {
    (column(), any::<bool>()).prop_map(|(column, asc)| {
        if asc {
            OrderTerm::asc(column)
        } else {
            OrderTerm::desc(column)
        }
    })
}

fn descriptor() -> impl Strategy<Value = QueryDescriptor> {
    (
        prop::sample::select(vec!["contact", "task", "team member"]),
        prop::sample::select(vec!["*", "id,username", "id,name:username"]),
        prop::collection::vec(filter(), 0..5),
        prop::collection::vec(order_term(), 0..3),
        prop::option::of((0u64..50, 1u64..20)),
        prop::option::of(prop::sample::select(vec![
            CountMode::Exact,
            CountMode::Planned,
            CountMode::Estimated,
        ])),
        any::<bool>(),
        prop::sample::select(vec![
            Cardinality::Many,
            Cardinality::Single,
            Cardinality::MaybeSingle,
        ]),
    )
        .prop_map(
            |(table, select, filters, order, range, count, is_head, cardinality)| QueryDescriptor {
                fields: Selection::parse(select),
                filters,
                order,
                range: range.map(|(offset, limit)| Range { offset, limit }),
                count,
                is_head,
                cardinality,
                ..QueryDescriptor::new(table)
            },
        )
}

fn keyed_row() -> impl Strategy<Value = Row> {
    (0i64..8, 0i64..60, "[a-c]{1,2}").prop_map(|(id, age, username)| {
        Row::new()
            .with("id", id)
            .with("age", age)
            .with("username", username)
    })
}

fn partial_row() -> impl Strategy<Value = Row> {
    prop::collection::btree_map(
        prop::sample::select(vec!["a", "b"]),
        prop_oneof![Just(Value::Null), (0i64..3).prop_map(Value::Int)],
        0..3,
    )
    .prop_map(|map| map.into_iter().collect())
}

// Distinct ids, in id order.
fn unique_rows(rows: Vec<Row>) -> Vec<Row> {
    let by_id: BTreeMap<String, Row> = rows
        .into_iter()
        .map(|row| (format!("{:?}", row.get("id")), row))
        .collect();
    by_id.into_values().collect()
}

// ─────────────────────────────────────────────
// Codec
// ─────────────────────────────────────────────

proptest! {
    #[test]
    fn decode_inverts_encode(d in descriptor()) {
        let codec = KeyCodec::default();
        let key = codec.encode(&d);

        prop_assert_eq!(codec.decode(&key), Ok(normalize(&d)));
    }

    #[test]
    fn encoding_ignores_clause_order(
        (d, shuffled) in descriptor().prop_flat_map(|d| {
            let filters = Just(d.filters.clone()).prop_shuffle();
            (Just(d), filters)
        })
    ) {
        let permuted = QueryDescriptor {
            filters: shuffled,
            ..d.clone()
        };

        prop_assert_eq!(KeyCodec::default().encode(&d), KeyCodec::default().encode(&permuted));
    }
}

// ─────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────

proptest! {
    #[test]
    fn identity_is_reflexive_and_symmetric(a in partial_row(), b in partial_row()) {
        let pk = vec!["a".to_string(), "b".to_string()];
        let defined = |row: &Row| {
            pk.iter().all(|c| row.get(c).is_some_and(|v| !v.is_null()))
        };

        prop_assert_eq!(identity_equals(&pk, &a, &a), defined(&a));
        prop_assert_eq!(identity_equals(&pk, &a, &b), identity_equals(&pk, &b, &a));
        if !defined(&a) || !defined(&b) {
            prop_assert!(!identity_equals(&pk, &a, &b));
        }
    }
}

// ─────────────────────────────────────────────
// Mutation engine
// ─────────────────────────────────────────────

#[derive(Clone, Debug)]
enum Step {
    Insert(Row),
    Delete(i64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        keyed_row().prop_map(Step::Insert),
        (0i64..8).prop_map(Step::Delete),
    ]
}

proptest! {
    #[test]
    fn count_stays_consistent_with_rows(steps in prop::collection::vec(step(), 1..20)) {
        let mut cache = MemoryCache::new();
        let key = cache.insert_query(
            &KeyCodec::default(),
            &QueryDescriptor {
                count: Some(CountMode::Exact),
                ..QueryDescriptor::new("contact")
            },
            CacheEntry::counted_rows(vec![], 0),
        );

        for step in steps {
            let request = match step {
                Step::Insert(row) => MutationRequest::insert("contact").row(row),
                Step::Delete(id) => MutationRequest::delete("contact").row(Row::new().with("id", id)),
            };
            apply_mutation(&mut cache, &request.primary_keys(["id"])).expect("mutation applies");

            let entry = cache.get(&key).expect("entry present");
            prop_assert_eq!(entry.count(), Some(entry.row_slice().len() as u64));
        }
    }

    #[test]
    fn upsert_is_idempotent(
        cached in prop::collection::vec(keyed_row(), 0..6),
        payload in prop::collection::vec(keyed_row(), 1..5),
    ) {
        let descriptor = QueryDescriptor {
            filters: vec![FilterClause::new("age", FilterOp::Gte, 18).into()],
            order: vec![OrderTerm::asc("age")],
            count: Some(CountMode::Exact),
            ..QueryDescriptor::new("contact")
        };
        let mut rows: Vec<Row> = unique_rows(cached)
            .into_iter()
            .filter(|row| row.get("age").is_some_and(|age| *age >= Value::Int(18)))
            .collect();
        rows.sort_by_key(|row| row.get("age").cloned());
        let count = rows.len() as u64;

        let mut cache = MemoryCache::new();
        let key = cache.insert_query(
            &KeyCodec::default(),
            &descriptor,
            CacheEntry::counted_rows(rows, count),
        );

        let request = MutationRequest::upsert("contact")
            .primary_keys(["id"])
            .rows(unique_rows(payload));

        apply_mutation(&mut cache, &request).expect("first upsert applies");
        let once = cache.get(&key).cloned();
        apply_mutation(&mut cache, &request).expect("second upsert applies");

        prop_assert_eq!(cache.get(&key).cloned(), once);
    }
}
