pub mod buffer;
pub mod cache_sink;
pub mod error;

pub use buffer::WriteBuffer;
pub use cache_sink::{CacheSink, CacheUpdate, NullCacheSink};
pub use error::BufferError;
