//! The record type (§3) and id/timestamp generation.

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde_json::{Map, Value};

const ID_LEN: usize = 15;
const ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Generates a 15-character URL-safe random token, used as a record's
/// `id`. Collisions are not checked here — the caller (the engine)
/// guarantees global uniqueness per collection by construction, since
/// it writes to a fresh primary key and would fail the "already
/// exists" precondition otherwise (create never overwrites silently
/// because it targets a key it just minted).
pub fn new_record_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ID_ALPHABET.len());
            ID_ALPHABET[idx] as char
        })
        .collect()
}

/// Current time formatted the way `created`/`updated` are stored:
/// ISO-8601 with millisecond resolution, always UTC.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A schema-shaped mapping from field name to value, always carrying
/// the three system fields plus `_version`.
///
/// Wraps a `serde_json::Map` rather than a typed struct because
/// schemas are permissive (§3: "additional properties are stored")
/// and field sets vary per collection — the same shape `Table` would
/// need a fixed byte layout for, a JSON-backed record sidesteps
/// entirely.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn created(&self) -> Option<&str> {
        self.0.get("created").and_then(Value::as_str)
    }

    pub fn updated(&self) -> Option<&str> {
        self.0.get("updated").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<i64> {
        self.0.get("_version").and_then(Value::as_i64)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Removes every field flagged `private` by `schema`. This is the
    /// *only* place a record is allowed to lose fields on the way out
    /// to a caller — the raw read used internally for update/delete
    /// diffing must never go through this.
    pub fn sanitize(mut self, private_fields: &[String]) -> Self {
        for field in private_fields {
            self.0.remove(field);
        }
        self
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // serde_json::to_vec on a Map of valid JSON values cannot fail.
        serde_json::to_vec(&self.0).expect("record serializes to valid JSON")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let map: Map<String, Value> = serde_json::from_slice(bytes)?;
        Ok(Self(map))
    }

    /// Builds a new record for `Engine::create`: fresh `id`,
    /// `created == updated == now`, `_version = 1`, plus the caller's
    /// payload.
    pub fn new_for_create(mut payload: Map<String, Value>) -> Self {
        let id = new_record_id();
        let now = now_iso8601();
        payload.insert("id".to_string(), Value::String(id));
        payload.insert("created".to_string(), Value::String(now.clone()));
        payload.insert("updated".to_string(), Value::String(now));
        payload.insert("_version".to_string(), Value::from(1));
        Self(payload)
    }

    /// Builds the merged record for `Engine::update`: `patch` fields
    /// overlay `self`, system fields are recomputed (`id`/`created`
    /// preserved, `updated` advanced, `_version` incremented).
    pub fn merge_for_update(&self, patch: &Map<String, Value>) -> Self {
        let mut merged = self.0.clone();
        for (k, v) in patch {
            if matches!(k.as_str(), "id" | "created" | "updated" | "_version") {
                continue;
            }
            merged.insert(k.clone(), v.clone());
        }
        merged.insert(
            "id".to_string(),
            self.0.get("id").cloned().unwrap_or(Value::Null),
        );
        merged.insert(
            "created".to_string(),
            self.0.get("created").cloned().unwrap_or(Value::Null),
        );
        merged.insert("updated".to_string(), Value::String(now_iso8601()));
        let next_version = self.version().unwrap_or(0) + 1;
        merged.insert("_version".to_string(), Value::from(next_version));
        Self(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_fifteen_chars() {
        let id = new_record_id();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn create_sets_version_one_and_equal_timestamps() {
        let mut payload = Map::new();
        payload.insert("title".to_string(), Value::String("a".to_string()));
        let record = Record::new_for_create(payload);
        assert_eq!(record.version(), Some(1));
        assert_eq!(record.created(), record.updated());
        assert_eq!(record.id().unwrap().len(), ID_LEN);
    }

    #[test]
    fn update_increments_version_and_preserves_created() {
        let mut payload = Map::new();
        payload.insert("title".to_string(), Value::String("a".to_string()));
        let original = Record::new_for_create(payload);
        std::thread::sleep(std::time::Duration::from_millis(2));

        let mut patch = Map::new();
        patch.insert("title".to_string(), Value::String("b".to_string()));
        let updated = original.merge_for_update(&patch);

        assert_eq!(updated.version(), Some(2));
        assert_eq!(updated.created(), original.created());
        assert_ne!(updated.updated(), original.updated());
        assert_eq!(updated.get("title"), Some(&Value::String("b".to_string())));
    }

    #[test]
    fn update_cannot_smuggle_system_fields_through_patch() {
        let mut payload = Map::new();
        payload.insert("title".to_string(), Value::String("a".to_string()));
        let original = Record::new_for_create(payload);

        let mut patch = Map::new();
        patch.insert("_version".to_string(), Value::from(999));
        patch.insert("id".to_string(), Value::String("hijacked".to_string()));
        let updated = original.merge_for_update(&patch);

        assert_eq!(updated.version(), Some(2));
        assert_eq!(updated.id(), original.id());
    }

    #[test]
    fn sanitize_removes_only_private_fields() {
        let mut payload = Map::new();
        payload.insert("email".to_string(), Value::String("x@y".to_string()));
        payload.insert("password".to_string(), Value::String("secret".to_string()));
        let record = Record::new_for_create(payload);
        let sanitized = record.sanitize(&["password".to_string()]);
        assert!(sanitized.get("password").is_none());
        assert!(sanitized.get("email").is_some());
    }
}
