//! Shared request/response plumbing used by every handler.

use std::collections::HashMap;

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{Request, Response};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use tokio::time;

use crate::body::{json_body, ResponseBody};
use crate::error::ApiError;

pub async fn read_body(req: Request<Incoming>, timeout: std::time::Duration) -> Result<Vec<u8>, ApiError> {
    let collected = time::timeout(timeout, req.collect())
        .await
        .map_err(|_| ApiError::Timeout)?
        .map_err(|e| ApiError::Internal(format!("failed to read request body: {e}")))?;
    Ok(collected.to_bytes().to_vec())
}

/// Serializes `data` as the response body verbatim — §6's REST surface
/// is specified bit-exact per endpoint, not wrapped in an envelope.
pub fn success<T: Serialize>(status: u16, data: T) -> Result<Response<ResponseBody>, ApiError> {
    let json = serde_json::to_vec(&data)
        .map_err(|e| ApiError::Internal(format!("failed to serialize response: {e}")))?;
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(json_body(json))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}

/// Parses `?page=&perPage=&filter=&sort=` (§6). `filter` is either a
/// JSON object or a single `field=value` pair; any other query key is
/// kept as a plain string value in `plain_filters` so a bare filter
/// like `owner_id=u1` still works without a `filter=` wrapper.
pub struct RawQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub plain_filters: HashMap<String, String>,
}

pub fn parse_query(query: Option<&str>) -> RawQuery {
    let mut out = RawQuery {
        page: None,
        per_page: None,
        filter: None,
        sort: None,
        plain_filters: HashMap::new(),
    };
    let Some(query) = query else { return out };

    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else { continue };
        let decoded = percent_decode_str(value).decode_utf8_lossy().to_string();
        match key {
            "page" => out.page = decoded.parse().ok(),
            "perPage" => out.per_page = decoded.parse().ok(),
            "filter" => out.filter = Some(decoded),
            "sort" => out.sort = Some(decoded),
            _ => {
                out.plain_filters.insert(key.to_string(), decoded);
            }
        }
    }
    out
}
