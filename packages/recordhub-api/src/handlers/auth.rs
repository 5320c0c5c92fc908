//! `POST /api/auth/login` (§6). Password verification and token
//! issuance are the named out-of-scope collaborators (§1, §9); this
//! handler only wires the request into those seams.

use hyper::body::Incoming;
use hyper::{Request, Response};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use recordhub_core::KvStore;
use recordhub_engine::ListQuery;

use crate::auth::issue_token;
use crate::body::ResponseBody;
use crate::error::ApiError;
use crate::request_utils::{read_body, success};
use crate::router::AppState;

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
    collection: String,
}

pub async fn login<S: KvStore + 'static>(
    req: Request<Incoming>,
    state: AppState<S>,
) -> Result<Response<ResponseBody>, ApiError> {
    let bytes = read_body(req, state.config.request_timeout).await?;
    let login: LoginRequest = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;

    let mut filter = BTreeMap::new();
    filter.insert("email".to_string(), Value::String(login.email.clone()));
    let found = state
        .engine
        .list(
            &login.collection,
            ListQuery {
                filter,
                per_page: 1,
                ..Default::default()
            },
        )
        .await
        .map_err(ApiError::from)?;

    let sanitized = found
        .items
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Forbidden("invalid credentials".to_string()))?;
    let id = sanitized.id().unwrap_or_default().to_string();

    let raw = state
        .engine
        .get_raw(&login.collection, &id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::Forbidden("invalid credentials".to_string()))?;
    let stored_password = raw.get("password").and_then(Value::as_str).unwrap_or_default();

    if !state.password_verifier.verify(stored_password, &login.password) {
        return Err(ApiError::Forbidden("invalid credentials".to_string()));
    }

    success(
        200,
        serde_json::json!({
            "token": issue_token(&id),
            "user": sanitized.into_value(),
        }),
    )
}
