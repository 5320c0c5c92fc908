//! HTTP-facing error type and the engine → status-code mapping (§6).

use hyper::Response;

use recordhub_engine::EngineError;

use crate::body::{json_body, ResponseBody};
use crate::response::error_response;

/// Everything a handler can fail with, already carrying its HTTP status.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Overload { pending: usize },
    Timeout,
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(m) => write!(f, "bad request: {m}"),
            ApiError::Forbidden(m) => write!(f, "forbidden: {m}"),
            ApiError::NotFound(m) => write!(f, "not found: {m}"),
            ApiError::Conflict(m) => write!(f, "conflict: {m}"),
            ApiError::Overload { pending } => write!(f, "overloaded: {pending} batches pending"),
            ApiError::Timeout => write!(f, "request timeout"),
            ApiError::Internal(m) => write!(f, "internal error: {m}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    fn status(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::Overload { .. } => 503,
            ApiError::Timeout => 408,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn into_response(self) -> Response<ResponseBody> {
        let status = self.status();
        let body = error_response(status, self.to_string(), None);
        let json = serde_json::to_vec(&body).unwrap_or_else(|_| {
            br#"{"success":false,"error":{"code":"500","message":"failed to serialize error"}}"#
                .to_vec()
        });

        let mut builder = Response::builder()
            .status(status)
            .header("Content-Type", "application/json");
        if let ApiError::Overload { .. } = &self {
            builder = builder.header("Retry-After", "1");
        }
        builder.body(json_body(json)).unwrap_or_else(|_| {
            Response::builder()
                .status(500)
                .body(json_body(b"internal error".to_vec()))
                .expect("static fallback response always builds")
        })
    }
}

/// Maps the engine's taxonomy onto the REST error table in §6: Forbidden
/// → 403, Validation → 400, NotFound → 404, Uniqueness/VersionConflict →
/// 409, Overload → 503, everything else → 500.
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnknownCollection(c) => ApiError::NotFound(format!("collection {c:?} not found")),
            EngineError::NotFound { collection, id } => {
                ApiError::NotFound(format!("record {collection}/{id} not found"))
            }
            EngineError::VersionConflict { expected, actual } => {
                ApiError::Conflict(format!("expected version {expected}, found {actual}"))
            }
            EngineError::Forbidden(m) => ApiError::Forbidden(m),
            EngineError::Validation(e) => ApiError::BadRequest(e.to_string()),
            EngineError::Index(recordhub_index::IndexError::UniquenessViolation { collection, field }) => {
                ApiError::Conflict(format!("{field:?} already taken in {collection}"))
            }
            EngineError::Index(e) => ApiError::Internal(e.to_string()),
            EngineError::Buffer(recordhub_buffer::BufferError::Overload { pending }) => {
                ApiError::Overload { pending }
            }
            EngineError::Buffer(e) => ApiError::Internal(e.to_string()),
            EngineError::Core(e) => ApiError::Internal(e.to_string()),
            EngineError::Corrupt(e) => ApiError::Internal(e),
        }
    }
}
