//! Fixed-capacity LRU cache (§4.1).
//!
//! Keyed by `<collection>:<id>`, holding decoded records. An
//! intrusive doubly-linked list over an arena of slots tracks
//! recency; a `HashMap` maps keys to slot indices. No TTL — the cache
//! is purely a read accelerator, never a source of truth (§3
//! invariant 7: it must never disagree with the substrate once
//! in-flight writes have settled).

use std::collections::HashMap;

use parking_lot::Mutex;

const NIL: usize = usize::MAX;

struct Slot<V> {
    key: String,
    value: V,
    prev: usize,
    next: usize,
}

struct Inner<V> {
    slots: Vec<Option<Slot<V>>>,
    index: HashMap<String, usize>,
    free: Vec<usize>,
    head: usize, // most recently used
    tail: usize, // least recently used
    max_size: usize,
    hits: u64,
    misses: u64,
}

impl<V: Clone> Inner<V> {
    fn new(max_size: usize) -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            max_size: max_size.max(1),
            hits: 0,
            misses: 0,
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let slot = self.slots[idx].as_ref().unwrap();
            (slot.prev, slot.next)
        };
        if prev != NIL {
            self.slots[prev].as_mut().unwrap().next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.slots[next].as_mut().unwrap().prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let slot = self.slots[idx].as_mut().unwrap();
            slot.prev = NIL;
            slot.next = old_head;
        }
        if old_head != NIL {
            self.slots[old_head].as_mut().unwrap().prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn touch(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn evict_tail(&mut self) {
        let tail = self.tail;
        if tail == NIL {
            return;
        }
        self.unlink(tail);
        let slot = self.slots[tail].take().unwrap();
        self.index.remove(&slot.key);
        self.free.push(tail);
    }

    fn get(&mut self, key: &str) -> Option<V> {
        match self.index.get(key).copied() {
            Some(idx) => {
                self.hits += 1;
                self.touch(idx);
                Some(self.slots[idx].as_ref().unwrap().value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    fn peek(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    fn set(&mut self, key: String, value: V) {
        if let Some(&idx) = self.index.get(&key) {
            self.slots[idx].as_mut().unwrap().value = value;
            self.touch(idx);
            return;
        }

        if self.index.len() >= self.max_size {
            self.evict_tail();
        }

        let idx = match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        self.slots[idx] = Some(Slot {
            key: key.clone(),
            value,
            prev: NIL,
            next: NIL,
        });
        self.index.insert(key, idx);
        self.push_front(idx);
    }

    fn delete(&mut self, key: &str) -> bool {
        match self.index.remove(key) {
            Some(idx) => {
                self.unlink(idx);
                self.slots[idx] = None;
                self.free.push(idx);
                true
            }
            None => false,
        }
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }
}

/// Point-in-time cache statistics (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Bounded-capacity, thread-safe LRU cache.
pub struct LruCache<V> {
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> LruCache<V> {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::new(max_size)),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.lock().get(key)
    }

    /// Checks presence without affecting hit/miss counters or
    /// recency — used by the single-flight loader to decide whether a
    /// fill is even needed before it takes the in-flight lock.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().peek(key)
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.inner.lock().set(key.into(), value);
    }

    pub fn delete(&self, key: &str) -> bool {
        self.inner.lock().delete(key)
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            size: inner.index.len(),
            max_size: inner.max_size,
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_hits() {
        let cache = LruCache::new(2);
        cache.set("a", 1);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn miss_on_absent_key() {
        let cache: LruCache<i32> = LruCache::new(2);
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn overflow_evicts_least_recently_used() {
        let cache = LruCache::new(2);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3); // evicts "a"
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn get_refreshes_recency_so_it_survives_eviction() {
        let cache = LruCache::new(2);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.get("a"); // "a" now most recently used
        cache.set("c", 3); // should evict "b", not "a"
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn delete_removes_entry() {
        let cache = LruCache::new(2);
        cache.set("a", 1);
        assert!(cache.delete("a"));
        assert_eq!(cache.get("a"), None);
        assert!(!cache.delete("a"));
    }

    #[test]
    fn stats_report_size_and_capacity() {
        let cache = LruCache::new(5);
        cache.set("a", 1);
        cache.set("b", 2);
        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.max_size, 5);
    }
}
