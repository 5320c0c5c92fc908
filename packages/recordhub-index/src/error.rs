use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("value for unique field {field:?} on {collection:?} is already taken")]
    UniquenessViolation { collection: String, field: String },

    #[error(transparent)]
    Core(#[from] recordhub_core::Error),
}
