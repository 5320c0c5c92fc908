//! The seam between a committed batch and whatever cache fronts it.
//!
//! The buffer has no opinion on what's cached or how it's keyed; it
//! just applies a list of `CacheUpdate`s to a `CacheSink` once their
//! batch has committed (or immediately, in optimistic mode).

/// One cache mutation to apply alongside a batch: a fresh value, or a
/// tombstone for a deleted record.
#[derive(Debug, Clone)]
pub enum CacheUpdate {
    Set(String, Vec<u8>),
    Tombstone(String),
}

pub trait CacheSink: Send + Sync {
    fn set(&self, key: &str, value: Vec<u8>);
    fn remove(&self, key: &str);
}

impl CacheUpdate {
    pub fn apply(&self, sink: &dyn CacheSink) {
        match self {
            CacheUpdate::Set(key, value) => sink.set(key, value.clone()),
            CacheUpdate::Tombstone(key) => sink.remove(key),
        }
    }
}

/// A `CacheSink` that does nothing — for callers (tests, `recordhub-tool`)
/// that don't front the buffer with a cache.
pub struct NullCacheSink;

impl CacheSink for NullCacheSink {
    fn set(&self, _key: &str, _value: Vec<u8>) {}
    fn remove(&self, _key: &str) {}
}
