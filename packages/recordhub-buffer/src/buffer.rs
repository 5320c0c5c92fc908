//! Group-commit write buffer (C6, §4.5) — the hardest subsystem.
//!
//! Two queues: an *ingress* of pending intents, coalesced on a timer or
//! a size trip into frozen batches on a FIFO *flush queue*, drained by
//! exactly one worker at a time. `drain_running` plus the
//! `flush_queue` mutex are what enforce that: a task that notices work
//! either becomes the sole drainer (the `compare_exchange` wins) or
//! trusts the current drainer to pick up what it just pushed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use recordhub_core::{Config, DurabilityMode, KvOp, KvStore};
use tokio::sync::{oneshot, Mutex as AsyncMutex};

use crate::cache_sink::{CacheSink, CacheUpdate};
use crate::error::BufferError;

/// Yield back to the scheduler after this many batches if the queue is
/// still deep, so a burst of flushes can't starve ingress.
const YIELD_EVERY_N_BATCHES: usize = 8;
const YIELD_QUEUE_DEPTH_THRESHOLD: usize = 4;

struct Intent {
    ops: Vec<KvOp>,
    cache_updates: Vec<CacheUpdate>,
    respond: Option<oneshot::Sender<Result<(), BufferError>>>,
}

struct Batch {
    ops: Vec<KvOp>,
    entries: Vec<(Vec<CacheUpdate>, Option<oneshot::Sender<Result<(), BufferError>>>)>,
}

struct Shared<S: KvStore> {
    kv: Arc<S>,
    cache_sink: Arc<dyn CacheSink>,
    durability_mode: DurabilityMode,
    flush_interval: Duration,
    max_buffer_size: usize,
    overload_threshold: usize,

    ingress: std::sync::Mutex<Vec<Intent>>,
    timer_armed: AtomicBool,
    flush_queue: AsyncMutex<VecDeque<Batch>>,
    flush_queue_len: AtomicUsize,
    drain_running: AtomicBool,
    draining: AtomicBool,
}

/// Coalesces concurrent writes into serialized batches against a
/// `KvStore`, applying cache updates once each batch is durable (or
/// immediately, under `DurabilityMode::Optimistic`).
pub struct WriteBuffer<S: KvStore> {
    shared: Arc<Shared<S>>,
}

impl<S: KvStore + 'static> Clone for WriteBuffer<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S: KvStore + 'static> WriteBuffer<S> {
    pub fn new(kv: Arc<S>, cache_sink: Arc<dyn CacheSink>, config: &Config) -> Self {
        let shared = Arc::new(Shared {
            kv,
            cache_sink,
            durability_mode: config.durability_mode,
            flush_interval: config.flush_interval,
            max_buffer_size: config.max_buffer_size,
            overload_threshold: config.overload_threshold,
            ingress: std::sync::Mutex::new(Vec::new()),
            timer_armed: AtomicBool::new(false),
            flush_queue: AsyncMutex::new(VecDeque::new()),
            flush_queue_len: AtomicUsize::new(0),
            drain_running: AtomicBool::new(false),
            draining: AtomicBool::new(false),
        });
        Self { shared }
    }

    /// Batches sitting in the flush queue right now (for `/api/stats/buffer`).
    pub fn pending_batches(&self) -> usize {
        self.shared.flush_queue_len.load(Ordering::Acquire)
    }

    /// Whether a drain worker is currently running a commit.
    pub fn is_draining(&self) -> bool {
        self.shared.drain_running.load(Ordering::Acquire)
    }

    /// Accepts an atomic write intent: the caller awaits the result
    /// according to the configured durability mode.
    pub async fn add(
        &self,
        ops: Vec<KvOp>,
        cache_updates: Vec<CacheUpdate>,
    ) -> Result<(), BufferError> {
        if self.shared.draining.load(Ordering::Acquire) {
            return self.commit_synchronously(ops, cache_updates).await;
        }

        let pending = self.shared.flush_queue_len.load(Ordering::Acquire);
        if pending > self.shared.overload_threshold {
            return Err(BufferError::Overload { pending });
        }

        match self.shared.durability_mode {
            DurabilityMode::Optimistic => {
                for update in &cache_updates {
                    update.apply(self.shared.cache_sink.as_ref());
                }
                self.enqueue(Intent {
                    ops,
                    cache_updates: Vec::new(),
                    respond: None,
                });
                Ok(())
            }
            DurabilityMode::Safe => {
                let (tx, rx) = oneshot::channel();
                self.enqueue(Intent {
                    ops,
                    cache_updates,
                    respond: Some(tx),
                });
                rx.await.unwrap_or(Err(BufferError::Commit(
                    "flush worker dropped without responding".to_string(),
                )))
            }
        }
    }

    fn enqueue(&self, intent: Intent) {
        let mut ingress = self.shared.ingress.lock().expect("ingress mutex poisoned");
        let was_empty = ingress.is_empty();
        ingress.push(intent);
        let size = ingress.len();
        drop(ingress);

        if size >= self.shared.max_buffer_size {
            self.shared.timer_armed.store(false, Ordering::Release);
            self.clone().spawn_flush_now();
        } else if was_empty
            && self
                .shared
                .timer_armed
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.clone().arm_timer();
        }
    }

    fn arm_timer(self) {
        let interval = self.shared.flush_interval;
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            if self
                .shared
                .timer_armed
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.flush().await;
            }
        });
    }

    fn spawn_flush_now(self) {
        tokio::spawn(async move {
            self.flush().await;
        });
    }

    /// Swaps the ingress into a frozen batch, pushes it onto the flush
    /// queue, and makes sure a drainer is running.
    async fn flush(&self) {
        let intents = {
            let mut ingress = self.shared.ingress.lock().expect("ingress mutex poisoned");
            std::mem::take(&mut *ingress)
        };
        if intents.is_empty() {
            return;
        }

        let mut ops = Vec::new();
        let mut entries = Vec::with_capacity(intents.len());
        for intent in intents {
            ops.extend(intent.ops);
            entries.push((intent.cache_updates, intent.respond));
        }
        let batch = Batch { ops, entries };

        {
            let mut q = self.shared.flush_queue.lock().await;
            q.push_back(batch);
            self.shared
                .flush_queue_len
                .store(q.len(), Ordering::Release);
        }

        self.clone().trigger_drain();
    }

    fn trigger_drain(self) {
        if self
            .shared
            .drain_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // a drainer is already running; it will see what we just pushed
            return;
        }
        tokio::spawn(async move {
            self.drain_loop().await;
        });
    }

    async fn drain_loop(self) {
        let mut drained = 0usize;
        loop {
            let batch = {
                let mut q = self.shared.flush_queue.lock().await;
                let batch = q.pop_front();
                self.shared
                    .flush_queue_len
                    .store(q.len(), Ordering::Release);
                batch
            };
            let Some(batch) = batch else { break };

            self.commit_batch(batch).await;
            drained += 1;

            if drained % YIELD_EVERY_N_BATCHES == 0
                && self.shared.flush_queue_len.load(Ordering::Acquire) > YIELD_QUEUE_DEPTH_THRESHOLD
            {
                tokio::task::yield_now().await;
            }
        }

        self.shared.drain_running.store(false, Ordering::Release);

        // Close the race between the last empty pop above and a push
        // that lands just before we clear the flag: if the queue is
        // non-empty now, make sure someone keeps draining it.
        let still_pending = !self.shared.flush_queue.lock().await.is_empty();
        if still_pending {
            self.trigger_drain();
        }
    }

    async fn commit_batch(&self, batch: Batch) {
        let result = self.shared.kv.batch(batch.ops);
        match result {
            Ok(()) => {
                for (cache_updates, respond) in batch.entries {
                    for update in &cache_updates {
                        update.apply(self.shared.cache_sink.as_ref());
                    }
                    if let Some(tx) = respond {
                        let _ = tx.send(Ok(()));
                    }
                }
            }
            Err(e) => {
                let msg = e.to_string();
                tracing::error!("batch commit failed: {msg}");
                for (_, respond) in batch.entries {
                    if let Some(tx) = respond {
                        let _ = tx.send(Err(BufferError::Commit(msg.clone())));
                    }
                }
            }
        }
    }

    /// Shutdown path (§4.5): new intents are forced synchronous from
    /// here on, pending ingress is flushed, and this returns only once
    /// the flush queue is empty and no worker is in flight.
    pub async fn shutdown(&self) {
        self.shared.draining.store(true, Ordering::Release);
        self.flush().await;
        loop {
            let idle = !self.shared.drain_running.load(Ordering::Acquire)
                && self.shared.flush_queue.lock().await.is_empty();
            if idle {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    async fn commit_synchronously(
        &self,
        ops: Vec<KvOp>,
        cache_updates: Vec<CacheUpdate>,
    ) -> Result<(), BufferError> {
        self.shared.kv.batch(ops)?;
        for update in &cache_updates {
            update.apply(self.shared.cache_sink.as_ref());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_sink::NullCacheSink;
    use recordhub_core::kv::MemoryKv;
    use recordhub_core::{KeySpace, KvOp};
    use std::sync::Mutex as StdMutex;

    struct RecordingSink {
        sets: StdMutex<Vec<(String, Vec<u8>)>>,
        removes: StdMutex<Vec<String>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                sets: StdMutex::new(Vec::new()),
                removes: StdMutex::new(Vec::new()),
            }
        }
    }

    impl CacheSink for RecordingSink {
        fn set(&self, key: &str, value: Vec<u8>) {
            self.sets.lock().unwrap().push((key.to_string(), value));
        }
        fn remove(&self, key: &str) {
            self.removes.lock().unwrap().push(key.to_string());
        }
    }

    fn config(flush_ms: u64, max_buffer: usize) -> Config {
        let mut cfg = Config::default();
        cfg.flush_interval = Duration::from_millis(flush_ms);
        cfg.max_buffer_size = max_buffer;
        cfg
    }

    #[tokio::test]
    async fn safe_mode_add_commits_and_resolves() {
        let kv = Arc::new(MemoryKv::new());
        let buffer = WriteBuffer::new(kv.clone(), Arc::new(NullCacheSink), &config(10, 500));
        buffer
            .add(
                vec![KvOp::put(KeySpace::Main, "posts:1", b"a".to_vec())],
                vec![],
            )
            .await
            .unwrap();
        assert_eq!(kv.get(KeySpace::Main, "posts:1"), Some(b"a".to_vec()));
    }

    #[tokio::test]
    async fn safe_mode_applies_cache_updates_after_commit() {
        let kv = Arc::new(MemoryKv::new());
        let sink = Arc::new(RecordingSink::new());
        let buffer = WriteBuffer::new(kv, sink.clone(), &config(10, 500));
        buffer
            .add(
                vec![KvOp::put(KeySpace::Main, "posts:1", b"a".to_vec())],
                vec![CacheUpdate::Set("posts:1".to_string(), b"a".to_vec())],
            )
            .await
            .unwrap();
        assert_eq!(sink.sets.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn size_trip_flushes_without_waiting_for_timer() {
        let kv = Arc::new(MemoryKv::new());
        // long timer, tiny max_buffer_size so the 2nd add trips an immediate flush
        let buffer = WriteBuffer::new(kv.clone(), Arc::new(NullCacheSink), &config(5_000, 1));
        buffer
            .add(
                vec![KvOp::put(KeySpace::Main, "posts:1", b"a".to_vec())],
                vec![],
            )
            .await
            .unwrap();
        assert_eq!(kv.get(KeySpace::Main, "posts:1"), Some(b"a".to_vec()));
    }

    #[tokio::test]
    async fn optimistic_mode_resolves_before_commit_lands() {
        let kv = Arc::new(MemoryKv::new());
        let mut cfg = config(5_000, 500);
        cfg.durability_mode = DurabilityMode::Optimistic;
        let sink = Arc::new(RecordingSink::new());
        let buffer = WriteBuffer::new(kv, sink.clone(), &cfg);

        buffer
            .add(
                vec![KvOp::put(KeySpace::Main, "posts:1", b"a".to_vec())],
                vec![CacheUpdate::Set("posts:1".to_string(), b"a".to_vec())],
            )
            .await
            .unwrap();
        // optimistic mode applies the cache update synchronously at add()
        assert_eq!(sink.sets.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_adds_all_land() {
        let kv = Arc::new(MemoryKv::new());
        let buffer = WriteBuffer::new(kv.clone(), Arc::new(NullCacheSink), &config(5, 500));

        let mut handles = Vec::new();
        for i in 0..100 {
            let buffer = buffer.clone();
            handles.push(tokio::spawn(async move {
                buffer
                    .add(
                        vec![KvOp::put(
                            KeySpace::Main,
                            format!("posts:{i}"),
                            b"x".to_vec(),
                        )],
                        vec![],
                    )
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        for i in 0..100 {
            assert!(kv.get(KeySpace::Main, &format!("posts:{i}")).is_some());
        }
    }

    /// A `KvStore` wrapper that fails if `batch` is ever entered while
    /// another `batch` call is still inside it — the "single committer"
    /// instrumented guard §8 asks for.
    struct GuardedKv {
        inner: MemoryKv,
        inside: std::sync::atomic::AtomicUsize,
    }

    impl recordhub_core::KvStore for GuardedKv {
        fn get(&self, space: KeySpace, key: &str) -> Option<Vec<u8>> {
            self.inner.get(space, key)
        }

        fn range(&self, space: KeySpace, opts: &recordhub_core::RangeOptions) -> Vec<(String, Vec<u8>)> {
            self.inner.range(space, opts)
        }

        fn batch(&self, ops: Vec<KvOp>) -> Result<(), recordhub_core::Error> {
            let depth = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
            assert_eq!(depth, 1, "two batches ran concurrently");
            std::thread::sleep(Duration::from_millis(2));
            let result = self.inner.batch(ops);
            self.inside.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[tokio::test]
    async fn single_committer_never_runs_two_batches_concurrently() {
        let kv = Arc::new(GuardedKv {
            inner: MemoryKv::new(),
            inside: std::sync::atomic::AtomicUsize::new(0),
        });
        let buffer = WriteBuffer::new(kv, Arc::new(NullCacheSink), &config(5, 10_000));

        let mut handles = Vec::new();
        for i in 0..50 {
            let buffer = buffer.clone();
            handles.push(tokio::spawn(async move {
                buffer
                    .add(vec![KvOp::put(KeySpace::Main, format!("posts:{i}"), b"x".to_vec())], vec![])
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn shutdown_drains_pending_ingress() {
        let kv = Arc::new(MemoryKv::new());
        let buffer = WriteBuffer::new(kv.clone(), Arc::new(NullCacheSink), &config(5_000, 500));
        buffer
            .add(
                vec![KvOp::put(KeySpace::Main, "posts:1", b"a".to_vec())],
                vec![],
            )
            .await
            .unwrap();
        buffer.shutdown().await;
        assert_eq!(kv.get(KeySpace::Main, "posts:1"), Some(b"a".to_vec()));
    }

    #[tokio::test]
    async fn add_after_shutdown_goes_through_synchronously() {
        let kv = Arc::new(MemoryKv::new());
        let buffer = WriteBuffer::new(kv.clone(), Arc::new(NullCacheSink), &config(5_000, 500));
        buffer.shutdown().await;
        buffer
            .add(
                vec![KvOp::put(KeySpace::Main, "posts:2", b"b".to_vec())],
                vec![],
            )
            .await
            .unwrap();
        assert_eq!(kv.get(KeySpace::Main, "posts:2"), Some(b"b".to_vec()));
    }
}
