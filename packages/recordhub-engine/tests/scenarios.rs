//! Concrete end-to-end scenarios: one test per literal example in the
//! engine's behavioral contract.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use recordhub_core::kv::MemoryKv;
use recordhub_core::Config;
use recordhub_engine::{Action, ChangeEvent, Engine, EngineError, Sink};
use recordhub_schema::{FieldDef, FieldType, Schema};
use serde_json::json;

fn engine() -> Engine<MemoryKv> {
    Engine::new(Arc::new(MemoryKv::new()), Config::default())
}

#[tokio::test]
async fn scenario_1_create_returns_fresh_id_and_matching_timestamps() {
    let engine = engine();
    let record = engine
        .create("posts", json!({"title": "a", "owner_id": "u1"}).as_object().unwrap().clone())
        .await
        .unwrap();

    assert_eq!(record.id().unwrap().len(), 15);
    assert_eq!(record.version(), Some(1));
    assert_eq!(record.created(), record.updated());
    assert_eq!(record.get("owner_id"), Some(&json!("u1")));
}

#[tokio::test]
async fn scenario_2_indexed_field_list_skips_the_scan_limit() {
    let engine = engine();
    engine
        .schemas()
        .put("posts", Schema::new(vec![FieldDef::new("owner_id", FieldType::String).indexed()]))
        .unwrap();

    for _ in 0..3 {
        engine.create("posts", json!({"owner_id": "u1"}).as_object().unwrap().clone()).await.unwrap();
    }
    for _ in 0..2 {
        engine.create("posts", json!({"owner_id": "u2"}).as_object().unwrap().clone()).await.unwrap();
    }

    let mut query = recordhub_engine::ListQuery::default();
    query.filter.insert("owner_id".to_string(), json!("u1"));
    let result = engine.list("posts", query).await.unwrap();

    assert_eq!(result.total_items, 3);
    assert_eq!(result.items.len(), 3);
}

#[tokio::test]
async fn scenario_3_concurrent_update_one_wins_the_other_retries() {
    let engine = engine();
    let created = engine
        .create("posts", json!({"title": "a"}).as_object().unwrap().clone())
        .await
        .unwrap();
    let id = created.id().unwrap().to_string();

    // First writer succeeds with the version it read.
    let updated = engine
        .update("posts", &id, json!({"title": "b"}).as_object().unwrap().clone(), Some(1))
        .await
        .unwrap();
    assert_eq!(updated.version(), Some(2));

    // A second writer still holding the stale expected version is
    // rejected directly (the conflict path the retry wrapper resolves
    // when it re-reads and tries again).
    let conflict = engine
        .update("posts", &id, json!({"title": "c"}).as_object().unwrap().clone(), Some(1))
        .await;
    assert!(matches!(conflict, Err(EngineError::VersionConflict { expected: 1, actual: 2 })));

    // The engine's own retry path (no expected version pinned) lands
    // the patch against whatever version is current.
    let retried = engine
        .update("posts", &id, json!({"title": "d"}).as_object().unwrap().clone(), None)
        .await
        .unwrap();
    assert_eq!(retried.version(), Some(3));
}

#[tokio::test]
async fn scenario_4_unique_field_rejects_the_second_create() {
    let engine = engine();
    engine.create("users", json!({"email": "x@y", "password": "s"}).as_object().unwrap().clone()).await.unwrap();

    let second = engine
        .create("users", json!({"email": "x@y", "password": "t"}).as_object().unwrap().clone())
        .await;

    assert!(matches!(
        second,
        Err(EngineError::Index(recordhub_index::IndexError::UniquenessViolation { .. }))
    ));
}

#[tokio::test]
async fn scenario_5_concurrent_cold_reads_collapse_into_one_load() {
    let engine = engine();
    let record = engine.create("posts", json!({"title": "a"}).as_object().unwrap().clone()).await.unwrap();
    let id = record.id().unwrap().to_string();

    let mut handles = Vec::new();
    let engine = Arc::new(engine);
    for _ in 0..200 {
        let engine = engine.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move { engine.get("posts", &id).await.unwrap() }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_some());
    }

    let stats = engine.cache_stats();
    assert!(stats.misses <= 1, "expected at most one cold load, got {} misses", stats.misses);
}

struct RecordingSink {
    events: Arc<std::sync::Mutex<Vec<(String, String)>>>,
    seen: AtomicUsize,
}

impl Sink for RecordingSink {
    fn write(&self, event: &str, payload: &str) -> bool {
        self.seen.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push((event.to_string(), payload.to_string()));
        true
    }
}

#[tokio::test]
async fn scenario_6_subscriber_sees_one_message_event_for_one_create() {
    let engine = engine();
    let events = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink: Arc<dyn Sink> = Arc::new(RecordingSink { events: events.clone(), seen: AtomicUsize::new(0) });
    engine.broadcaster().subscribe(sink);

    // The connection marker from `subscribe` itself should not be
    // mistaken for a data event.
    assert_eq!(events.lock().unwrap().len(), 1);
    assert_eq!(events.lock().unwrap()[0].0, "connected");

    engine.create("posts", json!({"title": "a"}).as_object().unwrap().clone()).await.unwrap();

    // `emit` is fire-and-forget via `tokio::spawn`; give the spawned
    // broadcast task a chance to run before checking what it recorded.
    for _ in 0..100 {
        if events.lock().unwrap().len() >= 2 {
            break;
        }
        tokio::task::yield_now().await;
    }

    let recorded = events.lock().unwrap();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[1].0, "message");
    let body: ChangeEvent = serde_json::from_str(&recorded[1].1).unwrap();
    assert_eq!(body.collection, "posts");
    assert_eq!(body.action, Action::Create);
    assert_eq!(body.record.get("title"), Some(&json!("a")));
}

#[tokio::test]
async fn second_configured_auth_collection_gets_login_style_sanitization_too() {
    let kv = Arc::new(MemoryKv::new());
    let config = Config {
        auth_collections: vec!["users".to_string(), "_superusers".to_string()],
        ..Config::default()
    };
    let engine = Engine::new(kv, config);

    let created = engine
        .create("_superusers", json!({"email": "root@x", "password": "hunter2"}).as_object().unwrap().clone())
        .await
        .unwrap();
    assert!(created.get("password").is_none(), "create's response must already be sanitized");

    // a duplicate email in the same auth-like collection is rejected,
    // same as it would be for `users`.
    let dup = engine
        .create("_superusers", json!({"email": "root@x", "password": "other"}).as_object().unwrap().clone())
        .await;
    assert!(matches!(
        dup,
        Err(EngineError::Index(recordhub_index::IndexError::UniquenessViolation { .. }))
    ));

    // login's lookup path: filter by email, then fetch the raw record
    // to check the password, which only works if the field is present
    // on the raw read and absent on the sanitized one.
    let id = created.id().unwrap().to_string();
    let mut filter = std::collections::BTreeMap::new();
    filter.insert("email".to_string(), json!("root@x"));
    let found = engine
        .list(
            "_superusers",
            recordhub_engine::ListQuery {
                filter,
                per_page: 1,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].id().unwrap(), id);

    let raw = engine.get_raw("_superusers", &id).await.unwrap().unwrap();
    assert_eq!(raw.get("password"), Some(&json!("hunter2")));
}

#[tokio::test]
async fn an_update_omitting_a_private_field_preserves_its_stored_value() {
    let engine = engine();
    let created = engine
        .create("users", json!({"email": "x@y", "password": "secret"}).as_object().unwrap().clone())
        .await
        .unwrap();
    assert!(created.get("password").is_none(), "create's response must already be sanitized");
    let id = created.id().unwrap().to_string();

    // The patch never mentions `password` — it must survive untouched.
    engine
        .update("users", &id, json!({"email": "x@y"}).as_object().unwrap().clone(), None)
        .await
        .unwrap();

    let raw = engine.get_raw("users", &id).await.unwrap().unwrap();
    assert_eq!(raw.get("password"), Some(&json!("secret")));
}
