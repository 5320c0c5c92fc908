use thiserror::Error;

use crate::schema::ValidationIssue;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("validation failed: {0:?}")]
    Validation(Vec<ValidationIssue>),

    #[error(transparent)]
    Core(#[from] recordhub_core::Error),

    #[error("malformed stored schema for collection {collection:?}: {source}")]
    Corrupt {
        collection: String,
        source: serde_json::Error,
    },
}
