//! Single-flight cache-fill (§4.2).
//!
//! Collapses N concurrent cache misses on the same key into exactly
//! one loader invocation. The loader is anything that can produce
//! `Option<V>` (absence is a valid, cacheable-as-miss outcome) or
//! fail with `E`; every joiner receives the same outcome the leader
//! produced.

use std::future::Future;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::lru::LruCache;

type FlightResult<V> = Result<Option<V>, String>;

struct Flight<V> {
    notify: Notify,
    result: Mutex<Option<FlightResult<V>>>,
}

impl<V> Flight<V> {
    fn new() -> Self {
        Self {
            notify: Notify::new(),
            result: Mutex::new(None),
        }
    }
}

/// Removes the in-flight entry for `key` when dropped, regardless of
/// whether the leader's load finished normally or was cancelled (the
/// task holding it got dropped mid-await) — the "finally" path §4.2
/// requires.
struct InFlightGuard<'a, V> {
    map: &'a DashMap<String, Arc<Flight<V>>>,
    key: &'a str,
}

impl<'a, V> Drop for InFlightGuard<'a, V> {
    fn drop(&mut self) {
        self.map.remove(self.key);
    }
}

/// Wraps an `LruCache` with single-flight cache-fill.
pub struct SingleFlight<V> {
    cache: Arc<LruCache<V>>,
    in_flight: DashMap<String, Arc<Flight<V>>>,
}

impl<V: Clone + Send + Sync + 'static> SingleFlight<V> {
    pub fn new(cache: Arc<LruCache<V>>) -> Self {
        Self {
            cache,
            in_flight: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &Arc<LruCache<V>> {
        &self.cache
    }

    /// Returns the cached value for `key`, or runs `loader` — exactly
    /// once across any number of concurrent callers racing on the
    /// same `key` — to fill it.
    ///
    /// `loader` errors are stringified into `String` before being
    /// shared with joiners, since the loader's own error type need not
    /// be `Clone`.
    pub async fn get<F, Fut>(&self, key: &str, loader: F) -> FlightResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FlightResult<V>>,
    {
        if let Some(v) = self.cache.get(key) {
            return Ok(Some(v));
        }

        let (flight, is_leader) = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(e) => (e.get().clone(), false),
            Entry::Vacant(e) => {
                let flight = Arc::new(Flight::new());
                e.insert(flight.clone());
                (flight, true)
            }
        };

        if !is_leader {
            return Self::join(flight).await;
        }

        let _guard = InFlightGuard {
            map: &self.in_flight,
            key,
        };

        let result = loader().await;
        if let Ok(Some(ref v)) = result {
            self.cache.set(key, v.clone());
        }
        *flight.result.lock() = Some(result.clone());
        flight.notify.notify_waiters();

        result
    }

    async fn join(flight: Arc<Flight<V>>) -> FlightResult<V> {
        loop {
            let notified = flight.notify.notified();
            if let Some(result) = flight.result.lock().clone() {
                return result;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn fills_cache_on_miss() {
        let sf = SingleFlight::new(Arc::new(LruCache::new(10)));
        let result = sf.get("a", || async { Ok(Some(42)) }).await.unwrap();
        assert_eq!(result, Some(42));
        assert_eq!(sf.cache().get("a"), Some(42));
    }

    #[tokio::test]
    async fn second_call_hits_cache_without_reloading() {
        let sf = SingleFlight::new(Arc::new(LruCache::new(10)));
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        sf.get("a", move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok(Some(1)) }
        })
        .await
        .unwrap();

        let c = calls.clone();
        sf.get("a", move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok(Some(2)) }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_miss_triggers_exactly_one_load() {
        let sf = Arc::new(SingleFlight::new(Arc::new(LruCache::new(10))));
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let sf = sf.clone();
            let loads = loads.clone();
            handles.push(tokio::spawn(async move {
                sf.get("cold", move || {
                    let loads = loads.clone();
                    async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(Some(7))
                    }
                })
                .await
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), Some(7));
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn loader_error_is_propagated_to_all_joiners() {
        let sf = Arc::new(SingleFlight::new(Arc::new(LruCache::<i32>::new(10))));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let sf = sf.clone();
            handles.push(tokio::spawn(async move {
                sf.get("boom", || async { Err("kaboom".to_string()) }).await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap_err(), "kaboom");
        }
    }

    #[tokio::test]
    async fn absent_loader_result_is_not_cached() {
        let sf = SingleFlight::new(Arc::new(LruCache::<i32>::new(10)));
        let result = sf.get("missing", || async { Ok(None) }).await.unwrap();
        assert_eq!(result, None);
        assert!(sf.cache().get("missing").is_none());
    }
}
