use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("collection {0:?} not found")]
    UnknownCollection(String),

    #[error("record {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("expected version {expected}, found {actual}")]
    VersionConflict { expected: i64, actual: i64 },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Validation(#[from] recordhub_schema::SchemaError),

    #[error(transparent)]
    Index(#[from] recordhub_index::IndexError),

    #[error(transparent)]
    Buffer(#[from] recordhub_buffer::BufferError),

    #[error(transparent)]
    Core(#[from] recordhub_core::Error),

    #[error("record is corrupt: {0}")]
    Corrupt(String),
}
