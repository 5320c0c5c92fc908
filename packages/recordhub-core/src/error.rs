//! Substrate-level error type.

use thiserror::Error;

/// Errors surfaced by the KV substrate and key codec.
///
/// Higher crates (schema, index, buffer, engine) define their own
/// error enums and fold this one in with `#[from]` rather than
/// matching on it directly, so a caller several layers up only ever
/// has to handle one error type per call.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The requested keyspace does not exist.
    #[error("unknown keyspace '{0}'")]
    UnknownKeySpace(String),

    /// A batch of KV ops failed to commit atomically.
    #[error("substrate batch failed: {0}")]
    Substrate(String),

    /// A collection name did not match `[A-Za-z0-9_]+`.
    #[error("invalid collection name '{0}'")]
    InvalidCollectionName(String),
}
