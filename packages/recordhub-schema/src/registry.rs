//! Schema registry (C4, §4.3).

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use recordhub_core::{KeySpace, KvOp, KvStore};
use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::schema::Schema;

fn meta_key(collection: &str) -> String {
    format!("schema:{collection}")
}

/// Holds one `Schema` per collection, backed by the `Meta` keyspace and
/// fronted by an in-memory map so repeated lookups don't round-trip
/// through JSON on every call.
pub struct Registry<S: KvStore> {
    kv: Arc<S>,
    cached: DashMap<String, Arc<Schema>>,
    auth_collections: HashSet<String>,
}

impl<S: KvStore> Registry<S> {
    /// Registry with only the conventional `users` collection
    /// auto-materializing an auth schema.
    pub fn new(kv: Arc<S>) -> Self {
        Self::with_auth_collections(kv, ["users".to_string()])
    }

    /// Registry whose auto-materializing auth collections are exactly
    /// the given set (§3, §4.3: "the two auth collection names" — a
    /// deployment's primary user table plus its superuser-like table).
    pub fn with_auth_collections(kv: Arc<S>, auth_collections: impl IntoIterator<Item = String>) -> Self {
        Self {
            kv,
            cached: DashMap::new(),
            auth_collections: auth_collections.into_iter().collect(),
        }
    }

    fn is_auth_collection(&self, name: &str) -> bool {
        self.auth_collections.contains(name)
    }

    /// Returns the schema for `collection`, auto-materializing the auth
    /// default for any configured auth collection the first time it's
    /// referenced, and persisting that default so subsequent process
    /// restarts see the same schema.
    pub fn get(&self, collection: &str) -> Result<Option<Arc<Schema>>, SchemaError> {
        if let Some(schema) = self.cached.get(collection) {
            return Ok(Some(schema.clone()));
        }

        if let Some(bytes) = self.kv.get(KeySpace::Meta, &meta_key(collection)) {
            let schema = Schema::from_bytes(&bytes).map_err(|source| SchemaError::Corrupt {
                collection: collection.to_string(),
                source,
            })?;
            let schema = Arc::new(schema);
            self.cached.insert(collection.to_string(), schema.clone());
            return Ok(Some(schema));
        }

        if self.is_auth_collection(collection) {
            let schema = Arc::new(Schema::auth_collection_default());
            self.persist(collection, &schema)?;
            self.cached.insert(collection.to_string(), schema.clone());
            return Ok(Some(schema));
        }

        Ok(None)
    }

    /// Replaces the schema for `collection`. The system fields are
    /// filled in if the caller omitted them.
    pub fn put(&self, collection: &str, schema: Schema) -> Result<Arc<Schema>, SchemaError> {
        let schema = Arc::new(Schema::new(schema.fields().to_vec()));
        self.persist(collection, &schema)?;
        self.cached.insert(collection.to_string(), schema.clone());
        Ok(schema)
    }

    fn persist(&self, collection: &str, schema: &Schema) -> Result<(), SchemaError> {
        self.kv
            .batch(vec![KvOp::put(
                KeySpace::Meta,
                meta_key(collection),
                schema.to_bytes(),
            )])
            .map_err(SchemaError::from)
    }

    /// Validates `record` against the collection's schema. A
    /// collection with no schema accepts anything.
    pub fn validate(&self, collection: &str, record: &Map<String, Value>) -> Result<(), SchemaError> {
        let Some(schema) = self.get(collection)? else {
            return Ok(());
        };
        let issues = schema.validate(record);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Validation(issues))
        }
    }
}
