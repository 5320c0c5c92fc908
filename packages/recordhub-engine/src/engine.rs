//! The CRUD engine (C7, §4.6): the eleven-step mutation recipe, the
//! single-flight read path, listing, and the version-conflict retry.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use recordhub_buffer::{CacheUpdate, WriteBuffer};
use recordhub_cache::SingleFlight;
use recordhub_core::keys::{index_value_prefix, primary_key, primary_prefix};
use recordhub_core::{Config, KeySpace, KvStore, Record, RangeOptions};
use recordhub_index::Indexer;
use recordhub_schema::{Registry, Schema};
use serde_json::{Map, Value};

use crate::auth::{AllowAll, AuthContext, AuthHook};
use crate::broadcast::{Action, Broadcaster, ChangeEvent};
use crate::cache_adapter::RecordCacheSink;
use crate::error::EngineError;
use crate::filter::{matches, parse_sort, sort_by_field};

/// Attempts after the first failure, with the matching backoff before
/// each (§4.6: "retried up to 3 times with exponential back-off (10
/// ms, 20 ms, 40 ms)").
const RETRY_BACKOFF_MS: [u64; 3] = [10, 20, 40];

/// A guard scanning more primary keys than this without a usable index
/// is a protective trip, not a normal path (§4.6).
const DEFAULT_MAX_SCAN_LIMIT_WARN_AT: usize = 1_000;

pub struct ListQuery {
    pub filter: BTreeMap<String, Value>,
    pub sort: Option<String>,
    pub page: usize,
    pub per_page: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filter: BTreeMap::new(),
            sort: None,
            page: 1,
            per_page: 30,
        }
    }
}

pub struct ListResult {
    pub items: Vec<Record>,
    pub total_items: usize,
    pub page: usize,
    pub per_page: usize,
}

/// Orchestrates CRUD over one `KvStore`, wiring together the schema
/// registry, indexer, write buffer, cache, and broadcaster (§2's data
/// flow diagram).
pub struct Engine<S: KvStore + 'static> {
    kv: Arc<S>,
    schemas: Arc<Registry<S>>,
    indexer: Arc<Indexer<S>>,
    cache: Arc<SingleFlight<Record>>,
    buffer: WriteBuffer<S>,
    broadcaster: Arc<Broadcaster>,
    auth: Arc<dyn AuthHook>,
    config: Config,
}

impl<S: KvStore + 'static> Engine<S> {
    pub fn new(kv: Arc<S>, config: Config) -> Self {
        Self::with_auth_hook(kv, config, Arc::new(AllowAll))
    }

    /// Constructs an engine with a non-default authorization collaborator
    /// (§1, §9: the row-level authorization predicates are glue, not
    /// core — this is the seam they plug into).
    pub fn with_auth_hook(kv: Arc<S>, config: Config, auth: Arc<dyn AuthHook>) -> Self {
        let lru = Arc::new(recordhub_cache::LruCache::new(config.max_cache_size));
        let cache = Arc::new(SingleFlight::new(lru.clone()));
        let cache_sink = Arc::new(RecordCacheSink::new(lru));
        let buffer = WriteBuffer::new(kv.clone(), cache_sink, &config);
        let broadcaster = Arc::new(Broadcaster::new());
        broadcaster.spawn_heartbeat();

        Self {
            schemas: Arc::new(Registry::with_auth_collections(kv.clone(), config.auth_collections.clone())),
            indexer: Arc::new(Indexer::new(kv.clone())),
            kv,
            cache,
            buffer,
            broadcaster,
            auth,
            config,
        }
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn schemas(&self) -> &Arc<Registry<S>> {
        &self.schemas
    }

    pub fn cache_stats(&self) -> recordhub_cache::CacheStats {
        self.cache.cache().stats()
    }

    pub fn buffer_pending_batches(&self) -> usize {
        self.buffer.pending_batches()
    }

    pub fn buffer_is_draining(&self) -> bool {
        self.buffer.is_draining()
    }

    fn schema_or_empty(&self, collection: &str) -> Result<Arc<Schema>, EngineError> {
        Ok(self
            .schemas
            .get(collection)?
            .unwrap_or_else(|| Arc::new(Schema::new(Vec::new()))))
    }

    pub async fn create(&self, collection: &str, payload: Map<String, Value>) -> Result<Record, EngineError> {
        with_retry(|| self.create_once(collection, payload.clone())).await
    }

    async fn create_once(&self, collection: &str, payload: Map<String, Value>) -> Result<Record, EngineError> {
        let schema = self.schema_or_empty(collection)?;

        let issues = schema.validate(&payload);
        if !issues.is_empty() {
            return Err(recordhub_schema::SchemaError::Validation(issues).into());
        }

        let new_record = Record::new_for_create(payload);
        let id = new_record.id().expect("new_for_create always sets id").to_string();

        self.indexer
            .check_uniqueness(collection, &new_record, &schema, None)?;

        self.auth
            .authorize(&AuthContext { collection, id: &id, record: &new_record })
            .map_err(EngineError::Forbidden)?;

        let key = primary_key(collection, &id);
        let mut ops = vec![recordhub_core::KvOp::put(
            KeySpace::Main,
            key.clone(),
            new_record.to_bytes(),
        )];
        ops.extend(self.indexer.diff(collection, &id, Some(&new_record), None, &schema));

        self.buffer
            .add(ops, vec![CacheUpdate::Set(key, new_record.to_bytes())])
            .await?;

        self.emit(collection, Action::Create, &schema, &new_record);
        Ok(new_record.sanitize(&schema.private_field_names()))
    }

    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
        expected_version: Option<i64>,
    ) -> Result<Record, EngineError> {
        with_retry(|| self.update_once(collection, id, patch.clone(), expected_version)).await
    }

    async fn update_once(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
        expected_version: Option<i64>,
    ) -> Result<Record, EngineError> {
        let schema = self.schema_or_empty(collection)?;

        let old = self
            .get_raw(collection, id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        if let Some(expected) = expected_version {
            let actual = old.version().unwrap_or(0);
            if actual != expected {
                return Err(EngineError::VersionConflict { expected, actual });
            }
        }

        let new_record = old.merge_for_update(&patch);
        let issues = schema.validate(&new_record.0);
        if !issues.is_empty() {
            return Err(recordhub_schema::SchemaError::Validation(issues).into());
        }

        self.indexer
            .check_uniqueness(collection, &new_record, &schema, Some(id))?;

        self.auth
            .authorize(&AuthContext { collection, id, record: &new_record })
            .map_err(EngineError::Forbidden)?;

        let key = primary_key(collection, id);
        let mut ops = vec![recordhub_core::KvOp::put(
            KeySpace::Main,
            key.clone(),
            new_record.to_bytes(),
        )];
        ops.extend(self.indexer.diff(collection, id, Some(&new_record), Some(&old), &schema));

        self.buffer
            .add(ops, vec![CacheUpdate::Set(key, new_record.to_bytes())])
            .await?;

        self.emit(collection, Action::Update, &schema, &new_record);
        Ok(new_record.sanitize(&schema.private_field_names()))
    }

    pub async fn delete(
        &self,
        collection: &str,
        id: &str,
        expected_version: Option<i64>,
    ) -> Result<Record, EngineError> {
        with_retry(|| self.delete_once(collection, id, expected_version)).await
    }

    async fn delete_once(
        &self,
        collection: &str,
        id: &str,
        expected_version: Option<i64>,
    ) -> Result<Record, EngineError> {
        let schema = self.schema_or_empty(collection)?;

        let old = self
            .get_raw(collection, id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        if let Some(expected) = expected_version {
            let actual = old.version().unwrap_or(0);
            if actual != expected {
                return Err(EngineError::VersionConflict { expected, actual });
            }
        }

        self.auth
            .authorize(&AuthContext { collection, id, record: &old })
            .map_err(EngineError::Forbidden)?;

        let key = primary_key(collection, id);
        let mut ops = vec![recordhub_core::KvOp::del(KeySpace::Main, key.clone())];
        ops.extend(self.indexer.diff(collection, id, None, Some(&old), &schema));

        self.buffer.add(ops, vec![CacheUpdate::Tombstone(key)]).await?;

        self.emit(collection, Action::Delete, &schema, &old);
        Ok(old.sanitize(&schema.private_field_names()))
    }

    /// Fire-and-forget broadcast on a deferred tick — must never block
    /// the write's return path (§4.6 step 10).
    fn emit(&self, collection: &str, action: Action, schema: &Schema, record: &Record) {
        let sanitized = record.clone().sanitize(&schema.private_field_names());
        let broadcaster = self.broadcaster.clone();
        let collection = collection.to_string();
        tokio::spawn(async move {
            broadcaster.broadcast(&ChangeEvent {
                collection,
                action,
                record: sanitized.into_value(),
            });
        });
    }

    /// Sanitized read for external callers.
    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, EngineError> {
        let schema = self.schema_or_empty(collection)?;
        let raw = self.get_raw(collection, id).await?;
        Ok(raw.map(|r| r.sanitize(&schema.private_field_names())))
    }

    /// Raw read (no sanitization), used internally for the diff/merge
    /// path and by the login collaborator, which needs the `password`
    /// field a sanitized `get` would strip (§6, §9: auth is glue, but
    /// it still needs this one seam into the engine).
    pub async fn get_raw(&self, collection: &str, id: &str) -> Result<Option<Record>, EngineError> {
        let key = primary_key(collection, id);
        let kv = self.kv.clone();
        let loader_key = key.clone();
        let result = self
            .cache
            .get(&key, move || async move {
                match kv.get(KeySpace::Main, &loader_key) {
                    Some(bytes) => Record::from_bytes(&bytes).map(Some).map_err(|e| e.to_string()),
                    None => Ok(None),
                }
            })
            .await
            .map_err(EngineError::Corrupt)?;
        Ok(result)
    }

    pub async fn list(&self, collection: &str, query: ListQuery) -> Result<ListResult, EngineError> {
        let schema = self.schema_or_empty(collection)?;

        let indexed_field = schema
            .indexed_fields()
            .find(|f| query.filter.contains_key(&f.name));

        let candidate_ids: Vec<String> = match indexed_field {
            Some(field) => {
                let value = &query.filter[&field.name];
                let norm = recordhub_core::keys::normalize_value(value);
                let prefix = index_value_prefix(collection, &field.name, &norm);
                self.kv
                    .range(KeySpace::Indexes, &RangeOptions::prefix(&prefix))
                    .into_iter()
                    .map(|(_, v)| String::from_utf8_lossy(&v).to_string())
                    .collect()
            }
            None => {
                let prefix = primary_prefix(collection);
                let opts = RangeOptions::prefix(&prefix).with_limit(self.config.max_scan_limit);
                let rows = self.kv.range(KeySpace::Main, &opts);
                if rows.len() >= self.config.max_scan_limit {
                    tracing::warn!(
                        "list({collection}): unindexed scan hit MAX_SCAN_LIMIT ({})",
                        self.config.max_scan_limit
                    );
                }
                rows.into_iter()
                    .filter_map(|(k, _)| k.rsplit_once(':').map(|(_, id)| id.to_string()))
                    .collect()
            }
        };

        let mut matched = Vec::new();
        for id in &candidate_ids {
            if let Some(record) = self.get(collection, id).await? {
                if matches(&record.0, &query.filter) {
                    matched.push(record);
                }
            }
        }

        if let Some(spec) = &query.sort {
            if matched.len() > DEFAULT_MAX_SCAN_LIMIT_WARN_AT {
                tracing::warn!(
                    "list({collection}): sort path materialized {} records",
                    matched.len()
                );
            }
            let (field, desc) = parse_sort(spec);
            let mut maps: Vec<_> = matched.into_iter().map(|r| r.0).collect();
            sort_by_field(&mut maps, field, desc);
            matched = maps.into_iter().map(Record::new).collect();
        }

        let total_items = matched.len();
        let start = query.per_page.saturating_mul(query.page.saturating_sub(1));
        let end = (start + query.per_page).min(total_items);
        let items = if start < total_items {
            matched[start..end].to_vec()
        } else {
            Vec::new()
        };

        Ok(ListResult {
            items,
            total_items,
            page: query.page,
            per_page: query.per_page,
        })
    }

    pub async fn shutdown(&self) {
        self.buffer.shutdown().await;
    }
}

async fn with_retry<F, Fut, T>(mut f: F) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(EngineError::VersionConflict { expected, actual }) if attempt < RETRY_BACKOFF_MS.len() => {
                tracing::debug!(
                    "version conflict (expected {expected}, actual {actual}), retrying attempt {}",
                    attempt + 1
                );
                tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS[attempt])).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
