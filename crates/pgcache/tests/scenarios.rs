use pgcache::{
    cache::{CacheAdapter, CacheEntry, MemoryCache},
    codec::KeyCodec,
    config::EngineConfig,
    error::{ErrorClass, InternalError},
    mutate::{MutationEngine, MutationError, MutationRequest, apply_mutation},
    query::{CountMode, OrderTerm, QueryBuilder, QueryDescriptor},
    row::Row,
};

fn rows_json(json: &str) -> Vec<Row> {
    serde_json::from_str(json).expect("fixture rows parse")
}

fn contacts_named(names: [&str; 2]) -> QueryDescriptor {
    QueryBuilder::from("contact")
        .in_("username", names)
        .and_then(|q| q.count(CountMode::Exact))
        .expect("query builds")
        .build()
}

#[test]
fn scenario_a_insert_into_empty_filtered_entry() {
    let mut cache = MemoryCache::new();
    let key = cache.insert_query(
        &KeyCodec::default(),
        &contacts_named(["X", "Y"]),
        CacheEntry::counted_rows(vec![], 0),
    );

    let request = MutationRequest::insert("contact")
        .primary_keys(["id"])
        .rows(rows_json(r#"[{"username":"X"}]"#));
    let outcome = apply_mutation(&mut cache, &request).expect("insert applies");

    assert_eq!(outcome.updated_keys, vec![key.clone()]);
    assert_eq!(
        cache.get(&key),
        Some(&CacheEntry::counted_rows(rows_json(r#"[{"username":"X"}]"#), 1))
    );
}

#[test]
fn scenario_b_update_keeps_position_and_count() {
    let mut cache = MemoryCache::new();
    let key = cache.insert_query(
        &KeyCodec::default(),
        &contacts_named(["X", "Y"]),
        CacheEntry::counted_rows(vec![], 0),
    );

    let insert = MutationRequest::insert("contact")
        .primary_keys(["id"])
        .rows(rows_json(r#"[{"id":1,"username":"X"},{"id":2,"username":"Y"}]"#));
    apply_mutation(&mut cache, &insert).expect("insert applies");

    let update = MutationRequest::update("contact")
        .primary_keys(["id"])
        .rows(rows_json(r#"[{"id":1,"username":"Y"}]"#));
    let outcome = apply_mutation(&mut cache, &update).expect("update applies");

    assert_eq!(outcome.updated_keys, vec![key.clone()]);
    assert_eq!(
        cache.get(&key),
        Some(&CacheEntry::counted_rows(
            rows_json(r#"[{"id":1,"username":"Y"},{"id":2,"username":"Y"}]"#),
            2
        ))
    );
}

#[test]
fn scenario_c_non_matching_insert_leaves_entry_unchanged() {
    let descriptor = QueryBuilder::from("pair")
        .eq("id_1", 0)
        .and_then(|q| q.eq("id_2", 0))
        .expect("query builds")
        .build();
    let cached = rows_json(r#"[{"id_1":0,"id_2":0,"label":"origin"}]"#);

    let mut cache = MemoryCache::new();
    let key = cache.insert_query(&KeyCodec::default(), &descriptor, CacheEntry::rows(cached.clone()));

    let request = MutationRequest::insert("pair")
        .primary_keys(["id_1", "id_2"])
        .rows(rows_json(r#"[{"id_1":1,"id_2":1,"label":"elsewhere"}]"#));
    let outcome = apply_mutation(&mut cache, &request).expect("insert applies");

    assert!(outcome.is_noop());
    assert_eq!(cache.get(&key), Some(&CacheEntry::rows(cached)));
}

#[test]
fn scenario_d_delete_decrements_count_only_entry() {
    let descriptor = QueryBuilder::from("contact")
        .head(CountMode::Exact)
        .expect("query builds")
        .build();

    let mut cache = MemoryCache::new();
    let key = cache.insert_query(&KeyCodec::default(), &descriptor, CacheEntry::Count(3));

    let delete = MutationRequest::delete("contact")
        .primary_keys(["id"])
        .rows(rows_json(r#"[{"id":5}]"#));
    apply_mutation(&mut cache, &delete).expect("delete applies");
    assert_eq!(cache.get(&key), Some(&CacheEntry::Count(2)));

    // Deletions on another table never reach this entry.
    let elsewhere = MutationRequest::delete("invoice")
        .primary_keys(["id"])
        .rows(rows_json(r#"[{"id":5}]"#));
    let outcome = apply_mutation(&mut cache, &elsewhere).expect("delete applies");
    assert!(outcome.is_noop());
    assert_eq!(cache.get(&key), Some(&CacheEntry::Count(2)));
}

#[test]
fn ordered_page_and_unordered_list_are_patched_together() {
    let codec = KeyCodec::default();
    let mut cache = MemoryCache::new();

    let page = QueryBuilder::from("task")
        .eq("done", false)
        .and_then(|q| q.order(OrderTerm::asc("due")))
        .and_then(|q| q.range(0, 1))
        .expect("query builds")
        .build();
    let page_key = cache.insert_query(
        &codec,
        &page,
        CacheEntry::Page {
            rows: rows_json(r#"[{"id":1,"done":false,"due":3},{"id":2,"done":false,"due":7}]"#),
            window: page.window().expect("paginated"),
            count: Some(4),
        },
    );
    let all = QueryBuilder::from("task").build();
    let all_key = cache.insert_query(
        &codec,
        &all,
        CacheEntry::rows(rows_json(
            r#"[{"id":1,"done":false,"due":3},{"id":2,"done":false,"due":7}]"#,
        )),
    );

    let request = MutationRequest::insert("task")
        .primary_keys(["id"])
        .rows(rows_json(r#"[{"id":9,"done":false,"due":5}]"#));
    let outcome = apply_mutation(&mut cache, &request).expect("insert applies");

    assert_eq!(outcome.updated_keys.len(), 2);
    assert_eq!(
        cache.get(&page_key).map(CacheEntry::row_slice),
        Some(&rows_json(r#"[{"id":1,"done":false,"due":3},{"id":9,"done":false,"due":5}]"#)[..])
    );
    assert_eq!(cache.get(&page_key).and_then(CacheEntry::count), Some(5));
    assert_eq!(cache.get(&all_key).map(|e| e.row_slice().len()), Some(3));
}

#[test]
fn unresolvable_entries_are_invalidated_while_others_update() {
    let codec = KeyCodec::default();
    let mut cache = MemoryCache::new();

    let by_owner = QueryBuilder::from("task").eq("owner", "ana").expect("query builds").build();
    let owner_key = cache.insert_query(&codec, &by_owner, CacheEntry::rows(vec![]));
    let everything = QueryBuilder::from("task").build();
    let all_key = cache.insert_query(&codec, &everything, CacheEntry::rows(vec![]));

    // No `owner` column: membership in the first entry is unknown.
    let request = MutationRequest::insert("task")
        .primary_keys(["id"])
        .rows(rows_json(r#"[{"id":1,"title":"write"}]"#));
    let outcome = apply_mutation(&mut cache, &request).expect("insert applies");

    assert_eq!(outcome.invalidated_keys, vec![owner_key.clone()]);
    assert_eq!(outcome.updated_keys, vec![all_key]);
    assert!(cache.is_invalidated(&owner_key));
}

#[test]
fn missing_key_rejects_the_whole_request() {
    let mut cache = MemoryCache::new();
    let key = cache.insert_query(
        &KeyCodec::default(),
        &QueryBuilder::from("contact").build(),
        CacheEntry::rows(rows_json(r#"[{"id":1,"username":"X"}]"#)),
    );

    let request = MutationRequest::update("contact")
        .primary_keys(["id"])
        .rows(rows_json(r#"[{"username":"Y"}]"#));
    let err = apply_mutation(&mut cache, &request).expect_err("no key in payload");

    assert!(matches!(err, MutationError::IdentityAmbiguous { index: 0, .. }));
    assert_eq!(
        cache.get(&key),
        Some(&CacheEntry::rows(rows_json(r#"[{"id":1,"username":"X"}]"#)))
    );
}

#[test]
fn engine_uses_configured_prefix() {
    let config = EngineConfig::from_toml_str(r#"key_prefix = "sb""#).expect("config parses");
    let engine = MutationEngine::new(config);

    let mut cache = MemoryCache::new();
    let ours = cache.insert_query(
        &KeyCodec::new("sb"),
        &QueryBuilder::from("contact").build(),
        CacheEntry::rows(vec![]),
    );
    let theirs = cache.insert_query(
        &KeyCodec::default(),
        &QueryBuilder::from("contact").build(),
        CacheEntry::rows(vec![]),
    );

    let request = MutationRequest::insert("contact")
        .primary_keys(["id"])
        .rows(rows_json(r#"[{"id":1}]"#));
    let outcome = engine.apply(&mut cache, &request).expect("insert applies");

    assert_eq!(outcome.updated_keys, vec![ours]);
    assert_eq!(cache.get(&theirs), Some(&CacheEntry::rows(vec![])));
}

// ─────────────────────────────────────────────
// Adapter failures
// ─────────────────────────────────────────────

///
/// FlakyCache
///
/// Wraps a `MemoryCache` and fails the configured adapter call.
///

struct FlakyCache {
    inner: MemoryCache,
    fail_scan: bool,
    fail_commit: bool,
}

impl CacheAdapter for FlakyCache {
    fn scan(&self, table: &str) -> Result<Vec<(String, CacheEntry)>, InternalError> {
        if self.fail_scan {
            return Err(InternalError::cache_io("store offline"));
        }
        self.inner.scan(table)
    }

    fn commit(&mut self, key: &str, entry: CacheEntry) -> Result<(), InternalError> {
        if self.fail_commit {
            return Err(InternalError::cache_io(format!("write to {key} failed")));
        }
        self.inner.commit(key, entry)
    }

    fn invalidate(&mut self, key: &str) -> Result<(), InternalError> {
        self.inner.invalidate(key)
    }
}

fn flaky(fail_scan: bool, fail_commit: bool) -> (FlakyCache, String) {
    let mut inner = MemoryCache::new();
    let key = inner.insert_query(
        &KeyCodec::default(),
        &QueryBuilder::from("contact").build(),
        CacheEntry::rows(vec![]),
    );

    (
        FlakyCache {
            inner,
            fail_scan,
            fail_commit,
        },
        key,
    )
}

#[test]
fn scan_failure_propagates_unchanged() {
    let (mut cache, _) = flaky(true, false);
    let request = MutationRequest::insert("contact")
        .primary_keys(["id"])
        .rows(rows_json(r#"[{"id":1}]"#));

    match apply_mutation(&mut cache, &request) {
        Err(MutationError::Cache(err)) => {
            assert_eq!(err, InternalError::cache_io("store offline"));
            assert_eq!(err.class, ErrorClass::Io);
        }
        other => panic!("expected cache error, got {other:?}"),
    }
}

#[test]
fn commit_failure_propagates_unchanged() {
    let (mut cache, key) = flaky(false, true);
    let request = MutationRequest::insert("contact")
        .primary_keys(["id"])
        .rows(rows_json(r#"[{"id":1}]"#));

    let err = apply_mutation(&mut cache, &request).expect_err("commit fails");

    assert!(err.to_string().contains(&key));
    assert_eq!(cache.inner.get(&key), Some(&CacheEntry::rows(vec![])));
}
