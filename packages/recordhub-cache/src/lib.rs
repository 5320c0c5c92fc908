//! Bounded LRU cache (C2) and single-flight cache-fill (C3).

pub mod lru;
pub mod singleflight;

pub use lru::{CacheStats, LruCache};
pub use singleflight::SingleFlight;
