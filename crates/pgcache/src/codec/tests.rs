use super::*;
use crate::{query::QueryBuilder, value::Value};

fn contacts() -> QueryDescriptor {
    QueryBuilder::from("contact")
        .select("id,username")
        .and_then(|q| q.in_("username", ["a", "b"]))
        .and_then(|q| q.count(CountMode::Exact))
        .unwrap()
        .build()
}

#[test]
fn encode_renders_postgrest_query_segment() {
    assert_eq!(
        encode(&contacts()),
        "postgrest$public$contact$select=id,username&username=in.(a,b)$count=exact$head=false$many"
    );
}

#[test]
fn decode_inverts_encode() {
    let descriptor = QueryBuilder::from("post")
        .schema("blog")
        .select("id,title,author:profile(name)")
        .and_then(|q| q.gte("score", 2.5))
        .and_then(|q| q.not("status", FilterOp::Eq, "draft"))
        .and_then(|q| q.is("deleted_at", None))
        .and_then(|q| q.contains("tags", vec!["rust", "db"]))
        .and_then(|q| {
            q.or(vec![
                FilterClause::new("author.name", FilterOp::Ilike, "a%").into(),
                Filter::And(vec![
                    FilterClause::new("views", FilterOp::Gt, 100).into(),
                    FilterClause::new("title", FilterOp::Eq, "a,b (c)").into(),
                ]),
            ])
        })
        .and_then(|q| q.order(OrderTerm::desc("score").nulls(NullsOrder::Last)))
        .and_then(|q| q.order(OrderTerm::asc("id")))
        .and_then(|q| q.range(20, 29))
        .unwrap()
        .build();

    let key = encode(&descriptor);
    assert_eq!(decode(&key).expect("key produced by encode"), descriptor);
}

#[test]
fn reserved_column_names_round_trip_as_groups() {
    for column in RESERVED_PARAMS {
        let descriptor = QueryDescriptor {
            filters: vec![
                FilterClause::new(column, FilterOp::Eq, 5).into(),
                FilterClause::new("status", FilterOp::Eq, "open").into(),
            ],
            order: vec![OrderTerm::asc("id")],
            ..QueryDescriptor::new("invoice")
        };

        let key = encode(&descriptor);
        assert!(key.contains(&format!("and=({column}.eq.5)")), "{key}");
        assert_eq!(decode(&key).expect("key produced by encode"), normalize(&descriptor));
    }
}

#[test]
fn clause_order_does_not_change_the_key() {
    let a = QueryBuilder::from("contact")
        .eq("team", 7)
        .and_then(|q| q.like("username", "a%"))
        .and_then(|q| q.in_("role", ["admin", "dev"]))
        .unwrap()
        .build();
    let b = QueryBuilder::from("contact")
        .in_("role", ["dev", "admin"])
        .and_then(|q| q.like("username", "a%"))
        .and_then(|q| q.eq("team", 7))
        .unwrap()
        .build();

    assert_eq!(encode(&a), encode(&b));
}

#[test]
fn encode_normalizes_unbuilt_descriptors() {
    let mut descriptor = QueryDescriptor::new("contact");
    descriptor.filters = vec![
        FilterClause::new("b", FilterOp::Eq, 2).into(),
        Filter::And(vec![FilterClause::new("a", FilterOp::Eq, 1).into()]),
    ];
    descriptor.order = vec![OrderTerm::asc("id").nulls(NullsOrder::Last)];

    assert_eq!(
        encode(&descriptor),
        "postgrest$public$contact$select=*&a=eq.1&b=eq.2&order=id.asc$count=null$head=false$many"
    );
}

#[test]
fn reserved_characters_are_escaped() {
    let descriptor = QueryBuilder::from("contact")
        .eq("note", "a$b & c=d")
        .unwrap()
        .build();
    let key = encode(&descriptor);

    assert_eq!(key.matches('$').count(), 6);
    assert!(key.contains("note=eq.a%24b%20%26%20c%3Dd"));
    assert_eq!(decode(&key).unwrap(), descriptor);
}

#[test]
fn text_that_looks_typed_survives_round_trip() {
    let descriptor = QueryBuilder::from("contact")
        .eq("zip", "01234")
        .and_then(|q| q.eq("flag", "true"))
        .and_then(|q| q.eq("empty", ""))
        .unwrap()
        .build();
    let decoded = decode(&encode(&descriptor)).unwrap();

    assert_eq!(decoded, descriptor);
    assert!(matches!(
        &decoded.filters[0],
        Filter::Clause(FilterClause { value: Value::Text(text), .. }) if text.is_empty()
    ));
}

#[test]
fn decode_accepts_hand_written_keys() {
    let key = "postgrest$public$post$select=*&or=(author.name.eq.ada,and(views.gt.1,views.lt.5))\
               &order=created_at.desc,id$count=null$head=false$maybe_single";
    let descriptor = decode(key).unwrap();

    assert_eq!(descriptor.cardinality, Cardinality::MaybeSingle);
    assert_eq!(descriptor.order.len(), 2);
    assert_eq!(descriptor.order[1], OrderTerm::asc("id"));
    let Filter::Or(children) = &descriptor.filters[0] else {
        panic!("expected an or group, got {:?}", descriptor.filters);
    };
    assert!(children.contains(&FilterClause::new("author.name", FilterOp::Eq, "ada").into()));
    assert!(children.iter().any(|child| matches!(child, Filter::And(inner) if inner.len() == 2)));
}

#[test]
fn limit_without_offset_starts_at_zero() {
    let descriptor =
        decode("postgrest$public$contact$select=*&limit=10$count=null$head=false$many").unwrap();

    assert_eq!(
        descriptor.range,
        Some(Range {
            offset: 0,
            limit: 10
        })
    );
}

#[test]
fn foreign_keys_are_rejected() {
    assert_eq!(decode("").unwrap_err(), DecodeError::Foreign);
    assert_eq!(
        decode("session$user$42").unwrap_err(),
        DecodeError::Foreign
    );
    assert_eq!(
        KeyCodec::new("other").decode(&encode(&contacts())).unwrap_err(),
        DecodeError::Foreign
    );
}

#[test]
fn malformed_keys_are_rejected() {
    assert_eq!(
        decode("postgrest$public$contact").unwrap_err(),
        DecodeError::WrongSegmentCount(3)
    );
    assert_eq!(
        decode("postgrest$public$contact$a=zz.1$count=null$head=false$many").unwrap_err(),
        DecodeError::UnknownOperator("zz".to_string())
    );
    assert_eq!(
        decode("postgrest$public$contact$a=eq$count=null$head=false$many").unwrap_err(),
        DecodeError::MalformedFilter("eq".to_string())
    );
    assert_eq!(
        decode("postgrest$public$contact$a=eq.1%G$count=null$head=false$many").unwrap_err(),
        DecodeError::InvalidEscape { position: 4 }
    );
    assert!(matches!(
        decode("postgrest$public$contact$a=in.1$count=null$head=false$many").unwrap_err(),
        DecodeError::InvalidLiteral { op: FilterOp::In, .. }
    ));
    assert!(matches!(
        decode("postgrest$public$contact$limit=0$count=null$head=false$many").unwrap_err(),
        DecodeError::InvalidParam { .. }
    ));
    assert!(matches!(
        decode("postgrest$public$contact$select=*$count=all$head=false$many").unwrap_err(),
        DecodeError::InvalidParam { .. }
    ));
    assert!(matches!(
        decode("postgrest$public$contact$select=*$count=null$head=false$several").unwrap_err(),
        DecodeError::InvalidParam { .. }
    ));
}

#[test]
fn custom_prefix_is_escaped_and_checked() {
    let codec = KeyCodec::new("app cache");
    let key = codec.encode(&contacts());

    assert!(key.starts_with("app%20cache$public$contact$"));
    assert_eq!(codec.decode(&key).unwrap(), contacts());
    assert_eq!(decode(&key).unwrap_err(), DecodeError::Foreign);
}

#[test]
fn head_queries_round_trip() {
    let descriptor = QueryBuilder::from("contact")
        .eq("team", 1)
        .and_then(|q| q.head(CountMode::Planned))
        .unwrap()
        .build();
    let key = encode(&descriptor);

    assert!(key.ends_with("$count=planned$head=true$many"));
    assert_eq!(decode(&key).unwrap(), descriptor);
}
