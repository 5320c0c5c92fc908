//! The KV substrate contract (§6) and a default in-process implementation.
//!
//! The core never depends on a concrete storage engine — only on this
//! trait. `MemoryKv` is the default: three ordered, `RwLock`-guarded
//! `BTreeMap`s, one per keyspace, with an atomic `batch`. A deployment
//! that needs data to outlive the process would implement `KvStore`
//! against something like `sled` without touching anything above this
//! module.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::Error;

/// The three named keyspaces the core addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySpace {
    /// Primary rows: `<collection>:<id>`.
    Main,
    /// Secondary and uniqueness index entries.
    Indexes,
    /// Schema registry rows.
    Meta,
}

/// One entry in an atomic batch.
#[derive(Debug, Clone)]
pub enum KvOp {
    Put {
        space: KeySpace,
        key: String,
        value: Vec<u8>,
    },
    Del {
        space: KeySpace,
        key: String,
    },
}

impl KvOp {
    pub fn put(space: KeySpace, key: impl Into<String>, value: Vec<u8>) -> Self {
        KvOp::Put {
            space,
            key: key.into(),
            value,
        }
    }

    pub fn del(space: KeySpace, key: impl Into<String>) -> Self {
        KvOp::Del {
            space,
            key: key.into(),
        }
    }
}

/// Bounds for a `KvStore::range` scan.
#[derive(Debug, Clone)]
pub struct RangeOptions {
    /// Inclusive lower bound.
    pub start: String,
    /// Exclusive upper bound.
    pub end: String,
    /// Maximum number of entries to return.
    pub limit: Option<usize>,
}

impl RangeOptions {
    pub fn prefix(prefix: &str) -> Self {
        Self {
            start: prefix.to_string(),
            end: crate::keys::prefix_range_end(prefix),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The ordered key/value store the engine is built against.
///
/// Implementations must provide: synchronous point reads, ordered
/// prefix range scans, and an atomically-applied batch across an
/// arbitrary mix of puts and deletes spanning any of the three
/// keyspaces. "Atomic" means: on `Ok(())`, every op in the batch is
/// visible to subsequent `get`/`range` calls; on `Err`, none are.
pub trait KvStore: Send + Sync {
    fn get(&self, space: KeySpace, key: &str) -> Option<Vec<u8>>;

    fn range(&self, space: KeySpace, opts: &RangeOptions) -> Vec<(String, Vec<u8>)>;

    fn batch(&self, ops: Vec<KvOp>) -> Result<(), Error>;
}

/// Default in-process `KvStore`: one ordered map per keyspace behind
/// a reader/writer lock, so reads never block each other and a write
/// only blocks readers for the duration of the batch.
#[derive(Debug, Default)]
pub struct MemoryKv {
    main: RwLock<BTreeMap<String, Vec<u8>>>,
    indexes: RwLock<BTreeMap<String, Vec<u8>>>,
    meta: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, space: KeySpace) -> &RwLock<BTreeMap<String, Vec<u8>>> {
        match space {
            KeySpace::Main => &self.main,
            KeySpace::Indexes => &self.indexes,
            KeySpace::Meta => &self.meta,
        }
    }
}

impl KvStore for MemoryKv {
    fn get(&self, space: KeySpace, key: &str) -> Option<Vec<u8>> {
        self.map(space).read().get(key).cloned()
    }

    fn range(&self, space: KeySpace, opts: &RangeOptions) -> Vec<(String, Vec<u8>)> {
        let guard = self.map(space).read();
        let iter = guard.range(opts.start.clone()..opts.end.clone());
        match opts.limit {
            Some(limit) => iter
                .take(limit)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => iter.map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    fn batch(&self, ops: Vec<KvOp>) -> Result<(), Error> {
        // Lock every touched keyspace up front, in a fixed order, so a
        // batch spanning multiple keyspaces can't deadlock against a
        // concurrent batch touching the same keyspaces in a different
        // order, and so the apply below is atomic from any reader's
        // point of view (no reader can observe a partially-applied
        // batch because it can't take any of these locks meanwhile).
        let mut main = self.main.write();
        let mut indexes = self.indexes.write();
        let mut meta = self.meta.write();

        for op in ops {
            match op {
                KvOp::Put { space, key, value } => {
                    let map = match space {
                        KeySpace::Main => &mut main,
                        KeySpace::Indexes => &mut indexes,
                        KeySpace::Meta => &mut meta,
                    };
                    map.insert(key, value);
                }
                KvOp::Del { space, key } => {
                    let map = match space {
                        KeySpace::Main => &mut main,
                        KeySpace::Indexes => &mut indexes,
                        KeySpace::Meta => &mut meta,
                    };
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }
}
