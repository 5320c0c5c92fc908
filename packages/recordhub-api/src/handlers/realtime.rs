//! `GET /api/realtime` (§6): a long-lived SSE stream fed by the
//! engine's `Broadcaster`.

use hyper::body::Bytes;
use hyper::Response;
use tokio::sync::mpsc;

use recordhub_core::KvStore;
use recordhub_engine::Sink;

use crate::body::{ChannelBody, ResponseBody};
use crate::error::ApiError;
use crate::router::AppState;

const SINK_BUFFER: usize = 32;

struct SseSink {
    tx: mpsc::Sender<Bytes>,
}

impl Sink for SseSink {
    fn write(&self, event: &str, payload: &str) -> bool {
        let frame = format!("event: {event}\ndata: {payload}\n\n");
        self.tx.try_send(Bytes::from(frame)).is_ok()
    }
}

pub async fn subscribe<S: KvStore + 'static>(state: AppState<S>) -> Result<Response<ResponseBody>, ApiError> {
    let (tx, rx) = mpsc::channel(SINK_BUFFER);
    state.engine.broadcaster().subscribe(std::sync::Arc::new(SseSink { tx }));

    Response::builder()
        .status(200)
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .header("Connection", "keep-alive")
        .body(ChannelBody::new(rx).boxed())
        .map_err(|e| ApiError::Internal(format!("failed to build SSE response: {e}")))
}
