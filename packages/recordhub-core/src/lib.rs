//! Storage primitives shared across the recordhub workspace.
//!
//! Provides the key codec, the key/value substrate contract (and an
//! in-process default implementation of it), the record type, and the
//! error taxonomy every higher crate composes into its own errors.

pub mod config;
pub mod error;
pub mod keys;
pub mod kv;
pub mod record;

pub use config::{Config, DurabilityMode};
pub use error::Error;
pub use kv::{KeySpace, KvOp, KvStore, RangeOptions};
pub use record::{new_record_id, Record};
