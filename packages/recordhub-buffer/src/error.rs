use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum BufferError {
    /// The flush queue is deeper than the overload threshold; callers
    /// should treat this as retryable.
    #[error("write buffer overloaded: {pending} batches pending")]
    Overload { pending: usize },

    #[error("batch commit failed: {0}")]
    Commit(String),
}

impl From<recordhub_core::Error> for BufferError {
    fn from(e: recordhub_core::Error) -> Self {
        BufferError::Commit(e.to_string())
    }
}
