//! `GET /api/collections/<c>/records` (§6).

use std::collections::BTreeMap;

use hyper::body::Incoming;
use hyper::{Request, Response};
use serde::Serialize;
use serde_json::Value;

use recordhub_core::KvStore;
use recordhub_engine::ListQuery;

use crate::body::ResponseBody;
use crate::error::ApiError;
use crate::request_utils::{parse_query, success};
use crate::router::AppState;

const DEFAULT_PER_PAGE: usize = 30;
const MAX_PER_PAGE: usize = 100;

#[derive(Serialize)]
struct ListPayload {
    items: Vec<Value>,
    page: usize,
    #[serde(rename = "perPage")]
    per_page: usize,
    #[serde(rename = "totalItems")]
    total_items: usize,
    #[serde(rename = "totalPages")]
    total_pages: usize,
}

fn parse_filter(raw: &crate::request_utils::RawQuery) -> Result<BTreeMap<String, Value>, ApiError> {
    if let Some(filter) = &raw.filter {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(filter) {
            return Ok(map.into_iter().collect());
        }
        if let Some((field, value)) = filter.split_once('=') {
            return Ok(BTreeMap::from([(field.to_string(), Value::String(value.to_string()))]));
        }
        return Err(ApiError::BadRequest(format!("unparseable filter {filter:?}")));
    }
    Ok(raw
        .plain_filters
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect())
}

pub async fn list<S: KvStore + 'static>(
    req: Request<Incoming>,
    collection: String,
    state: AppState<S>,
) -> Result<Response<ResponseBody>, ApiError> {
    let raw = parse_query(req.uri().query());
    let filter = parse_filter(&raw)?;
    let per_page = raw.per_page.unwrap_or(DEFAULT_PER_PAGE).min(MAX_PER_PAGE).max(1);
    let page = raw.page.unwrap_or(1).max(1);

    let query = ListQuery {
        filter,
        sort: raw.sort,
        page,
        per_page,
    };

    let result = state.engine.list(&collection, query).await.map_err(ApiError::from)?;
    let total_pages = ((result.total_items + result.per_page - 1) / result.per_page).max(1);

    success(
        200,
        ListPayload {
            items: result.items.into_iter().map(|r| r.into_value()).collect(),
            page: result.page,
            per_page: result.per_page,
            total_items: result.total_items,
            total_pages,
        },
    )
}
