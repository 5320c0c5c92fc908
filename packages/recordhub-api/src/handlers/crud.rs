//! Record CRUD handlers (§6).

use hyper::body::Incoming;
use hyper::{Request, Response};
use serde_json::Value;

use recordhub_core::KvStore;

use crate::body::ResponseBody;
use crate::error::ApiError;
use crate::request_utils::{read_body, success};
use crate::router::AppState;

pub async fn create<S: KvStore + 'static>(
    req: Request<Incoming>,
    collection: String,
    state: AppState<S>,
) -> Result<Response<ResponseBody>, ApiError> {
    let bytes = read_body(req, state.config.request_timeout).await?;
    let payload: serde_json::Map<String, Value> = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;

    let record = state.engine.create(&collection, payload).await.map_err(ApiError::from)?;
    success(201, record.into_value())
}

pub async fn read<S: KvStore + 'static>(
    collection: String,
    id: String,
    state: AppState<S>,
) -> Result<Response<ResponseBody>, ApiError> {
    match state.engine.get(&collection, &id).await.map_err(ApiError::from)? {
        Some(record) => success(200, record.into_value()),
        None => Err(ApiError::NotFound(format!("record {collection}/{id} not found"))),
    }
}

pub async fn update<S: KvStore + 'static>(
    req: Request<Incoming>,
    collection: String,
    id: String,
    state: AppState<S>,
) -> Result<Response<ResponseBody>, ApiError> {
    let bytes = read_body(req, state.config.request_timeout).await?;
    let mut patch: serde_json::Map<String, Value> = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;

    let expected_version = patch
        .remove("_expectedVersion")
        .and_then(|v| v.as_i64());

    let record = state
        .engine
        .update(&collection, &id, patch, expected_version)
        .await
        .map_err(ApiError::from)?;
    success(200, record.into_value())
}

pub async fn delete<S: KvStore + 'static>(
    req: Request<Incoming>,
    collection: String,
    id: String,
    state: AppState<S>,
) -> Result<Response<ResponseBody>, ApiError> {
    let expected_version = req
        .uri()
        .query()
        .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("version=")))
        .and_then(|v| v.parse::<i64>().ok());

    state
        .engine
        .delete(&collection, &id, expected_version)
        .await
        .map_err(ApiError::from)?;
    success(200, serde_json::json!({"success": true, "id": id}))
}
