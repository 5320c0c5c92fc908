//! Bridges `WriteBuffer`'s transport-agnostic `CacheSink` to the
//! record cache the engine reads through.

use std::sync::Arc;

use recordhub_buffer::CacheSink;
use recordhub_cache::LruCache;
use recordhub_core::Record;

pub struct RecordCacheSink {
    cache: Arc<LruCache<Record>>,
}

impl RecordCacheSink {
    pub fn new(cache: Arc<LruCache<Record>>) -> Self {
        Self { cache }
    }
}

impl CacheSink for RecordCacheSink {
    fn set(&self, key: &str, value: Vec<u8>) {
        match Record::from_bytes(&value) {
            Ok(record) => self.cache.set(key, record),
            Err(e) => tracing::warn!("dropping cache update for {key}: {e}"),
        }
    }

    fn remove(&self, key: &str) {
        self.cache.delete(key);
    }
}
