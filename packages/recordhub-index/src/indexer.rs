//! Secondary-index and uniqueness-constraint maintenance (C5, §4.4).

use std::sync::Arc;

use recordhub_core::keys::{index_key, normalize_value, uniqueness_key};
use recordhub_core::{KeySpace, KvOp, KvStore, Record};
use recordhub_schema::Schema;

use crate::error::IndexError;

/// Computes index-maintenance ops and enforces uniqueness against the
/// `Indexes` keyspace.
pub struct Indexer<S: KvStore> {
    kv: Arc<S>,
}

impl<S: KvStore> Indexer<S> {
    pub fn new(kv: Arc<S>) -> Self {
        Self { kv }
    }

    /// Computes the ops needed to move a record's index entries from
    /// `old` to `new`. Either may be `None` (create has no `old`,
    /// delete has no `new`). Only `indexed` fields are considered; a
    /// field whose old and new value are equal emits nothing.
    pub fn diff(
        &self,
        collection: &str,
        id: &str,
        new: Option<&Record>,
        old: Option<&Record>,
        schema: &Schema,
    ) -> Vec<KvOp> {
        let mut ops = Vec::new();
        for field in schema.indexed_fields() {
            let old_value = old.and_then(|r| r.get(&field.name));
            let new_value = new.and_then(|r| r.get(&field.name));
            if old_value == new_value {
                continue;
            }

            if let Some(value) = old_value {
                let norm = normalize_value(value);
                ops.push(KvOp::del(
                    KeySpace::Indexes,
                    index_key(collection, &field.name, &norm, id),
                ));
                if field.unique {
                    ops.push(KvOp::del(
                        KeySpace::Indexes,
                        uniqueness_key(collection, &field.name, &norm),
                    ));
                }
            }

            if let Some(value) = new_value {
                let norm = normalize_value(value);
                ops.push(KvOp::put(
                    KeySpace::Indexes,
                    index_key(collection, &field.name, &norm, id),
                    id.as_bytes().to_vec(),
                ));
                if field.unique {
                    ops.push(KvOp::put(
                        KeySpace::Indexes,
                        uniqueness_key(collection, &field.name, &norm),
                        id.as_bytes().to_vec(),
                    ));
                }
            }
        }
        ops
    }

    /// Fails with `UniquenessViolation` if any `unique` field in
    /// `new_record` is already claimed by a different record.
    /// `excluding_id` is the id of the record being updated (so it
    /// doesn't conflict with its own current value).
    pub fn check_uniqueness(
        &self,
        collection: &str,
        new_record: &Record,
        schema: &Schema,
        excluding_id: Option<&str>,
    ) -> Result<(), IndexError> {
        for field in schema.unique_fields() {
            let Some(value) = new_record.get(&field.name) else {
                continue;
            };
            let norm = normalize_value(value);
            let key = uniqueness_key(collection, &field.name, &norm);
            if let Some(bytes) = self.kv.get(KeySpace::Indexes, &key) {
                let owner = String::from_utf8_lossy(&bytes);
                if Some(owner.as_ref()) != excluding_id {
                    return Err(IndexError::UniquenessViolation {
                        collection: collection.to_string(),
                        field: field.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordhub_core::kv::MemoryKv;
    use recordhub_schema::field::{FieldDef, FieldType};
    use serde_json::{Map, Value};

    fn schema() -> Schema {
        Schema::new(vec![
            FieldDef::new("email", FieldType::String)
                .required()
                .unique()
                .indexed(),
            FieldDef::new("age", FieldType::Number).indexed(),
        ])
    }

    fn record(email: &str, age: i64) -> Record {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::String("rec1".to_string()));
        map.insert("email".to_string(), Value::String(email.to_string()));
        map.insert("age".to_string(), Value::from(age));
        Record::new(map)
    }

    #[test]
    fn diff_on_create_emits_puts_only() {
        let indexer = Indexer::new(Arc::new(MemoryKv::new()));
        let new = record("a@b.com", 30);
        let ops = indexer.diff("users", "rec1", Some(&new), None, &schema());
        assert_eq!(ops.len(), 4); // 2 fields x (index + uniq for email, index only for age)
    }

    #[test]
    fn diff_on_delete_emits_dels_only() {
        let indexer = Indexer::new(Arc::new(MemoryKv::new()));
        let old = record("a@b.com", 30);
        let ops = indexer.diff("users", "rec1", None, Some(&old), &schema());
        assert_eq!(ops.len(), 4);
        assert!(ops.iter().all(|op| matches!(op, KvOp::Del { .. })));
    }

    #[test]
    fn diff_on_unchanged_field_emits_nothing_for_it() {
        let indexer = Indexer::new(Arc::new(MemoryKv::new()));
        let old = record("a@b.com", 30);
        let new = record("a@b.com", 31);
        let ops = indexer.diff("users", "rec1", Some(&new), Some(&old), &schema());
        // only "age" changed: 1 del + 1 put, no email ops
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn check_uniqueness_passes_when_value_is_free() {
        let indexer = Indexer::new(Arc::new(MemoryKv::new()));
        let new = record("a@b.com", 30);
        assert!(indexer
            .check_uniqueness("users", &new, &schema(), None)
            .is_ok());
    }

    #[test]
    fn check_uniqueness_fails_when_taken_by_another_record() {
        let kv = Arc::new(MemoryKv::new());
        kv.batch(vec![KvOp::put(
            KeySpace::Indexes,
            uniqueness_key("users", "email", "a@b.com"),
            b"other-id".to_vec(),
        )])
        .unwrap();
        let indexer = Indexer::new(kv);
        let new = record("a@b.com", 30);
        let err = indexer
            .check_uniqueness("users", &new, &schema(), Some("rec1"))
            .unwrap_err();
        assert!(matches!(err, IndexError::UniquenessViolation { .. }));
    }

    #[test]
    fn check_uniqueness_passes_when_taken_by_excluded_id() {
        let kv = Arc::new(MemoryKv::new());
        kv.batch(vec![KvOp::put(
            KeySpace::Indexes,
            uniqueness_key("users", "email", "a@b.com"),
            b"rec1".to_vec(),
        )])
        .unwrap();
        let indexer = Indexer::new(kv);
        let new = record("a@b.com", 30);
        assert!(indexer
            .check_uniqueness("users", &new, &schema(), Some("rec1"))
            .is_ok());
    }
}
