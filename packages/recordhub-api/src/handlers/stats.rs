//! `GET /api/stats`, `GET /api/stats/buffer`, `GET /health` (§6).

use hyper::Response;
use serde::Serialize;

use recordhub_core::KvStore;

use crate::body::ResponseBody;
use crate::error::ApiError;
use crate::request_utils::success;
use crate::router::AppState;

#[derive(Serialize)]
struct StatsPayload {
    cache_size: usize,
    cache_max_size: usize,
    cache_hits: u64,
    cache_misses: u64,
    subscriber_count: usize,
}

#[derive(Serialize)]
struct BufferStatsPayload {
    pending_batches: usize,
    draining: bool,
    overload_threshold: usize,
}

pub async fn stats<S: KvStore + 'static>(state: AppState<S>) -> Result<Response<ResponseBody>, ApiError> {
    let cache = state.engine.cache_stats();
    success(
        200,
        StatsPayload {
            cache_size: cache.size,
            cache_max_size: cache.max_size,
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            subscriber_count: state.engine.broadcaster().sink_count(),
        },
    )
}

pub async fn buffer_stats<S: KvStore + 'static>(state: AppState<S>) -> Result<Response<ResponseBody>, ApiError> {
    success(
        200,
        BufferStatsPayload {
            pending_batches: state.engine.buffer_pending_batches(),
            draining: state.engine.buffer_is_draining(),
            overload_threshold: state.config.overload_threshold,
        },
    )
}

pub async fn health() -> Result<Response<ResponseBody>, ApiError> {
    success(200, serde_json::json!({"status": "ok"}))
}
