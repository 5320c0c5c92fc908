//! `POST /api/batch` (§6): up to `MAX_BATCH_SIZE` heterogeneous CRUD
//! ops executed in request order, each reporting its own outcome.

use hyper::body::Incoming;
use hyper::{Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use recordhub_core::KvStore;

use crate::body::ResponseBody;
use crate::error::ApiError;
use crate::request_utils::{read_body, success};
use crate::router::AppState;

#[derive(Deserialize)]
struct BatchRequest {
    requests: Vec<BatchOp>,
}

#[derive(Deserialize)]
struct BatchOp {
    method: String,
    collection: String,
    id: Option<String>,
    data: Option<serde_json::Map<String, Value>>,
}

#[derive(Serialize)]
struct BatchOutcome {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn run<S: KvStore + 'static>(
    req: Request<Incoming>,
    state: AppState<S>,
) -> Result<Response<ResponseBody>, ApiError> {
    let bytes = read_body(req, state.config.request_timeout).await?;
    let batch: BatchRequest = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;

    if batch.requests.len() > state.config.max_batch_size {
        return Err(ApiError::BadRequest(format!(
            "batch of {} exceeds MAX_BATCH_SIZE ({})",
            batch.requests.len(),
            state.config.max_batch_size
        )));
    }

    let mut results = Vec::with_capacity(batch.requests.len());
    for op in batch.requests {
        results.push(run_one(&state, op).await);
    }

    success(200, serde_json::json!({ "results": results }))
}

async fn run_one<S: KvStore + 'static>(state: &AppState<S>, op: BatchOp) -> BatchOutcome {
    let outcome = async {
        match op.method.to_ascii_uppercase().as_str() {
            "POST" => {
                let data = op.data.ok_or_else(|| ApiError::BadRequest("POST requires data".to_string()))?;
                let record = state.engine.create(&op.collection, data).await?;
                Ok(record.into_value())
            }
            "GET" => {
                let id = op.id.ok_or_else(|| ApiError::BadRequest("GET requires id".to_string()))?;
                let record = state
                    .engine
                    .get(&op.collection, &id)
                    .await?
                    .ok_or_else(|| ApiError::NotFound(format!("record {}/{id} not found", op.collection)))?;
                Ok(record.into_value())
            }
            "PATCH" => {
                let id = op.id.ok_or_else(|| ApiError::BadRequest("PATCH requires id".to_string()))?;
                let mut data = op.data.ok_or_else(|| ApiError::BadRequest("PATCH requires data".to_string()))?;
                let expected_version = data.remove("_expectedVersion").and_then(|v| v.as_i64());
                let record = state.engine.update(&op.collection, &id, data, expected_version).await?;
                Ok(record.into_value())
            }
            "DELETE" => {
                let id = op.id.ok_or_else(|| ApiError::BadRequest("DELETE requires id".to_string()))?;
                state.engine.delete(&op.collection, &id, None).await?;
                Ok(serde_json::json!({"success": true, "id": id}))
            }
            other => Err(ApiError::BadRequest(format!("unsupported batch method {other:?}"))),
        }
    }
    .await;

    match outcome {
        Ok(value) => BatchOutcome {
            success: true,
            result: Some(value),
            error: None,
        },
        Err(e) => BatchOutcome {
            success: false,
            result: None,
            error: Some(e.to_string()),
        },
    }
}
