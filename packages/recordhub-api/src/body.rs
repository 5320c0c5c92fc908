//! The response body type shared by ordinary JSON handlers and the
//! long-lived SSE stream (`/api/realtime`), which needs to keep
//! writing frames long after the handler itself has returned.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes, Frame};
use tokio::sync::mpsc;

pub type ResponseBody = BoxBody<Bytes, Infallible>;

pub fn json_body(bytes: Vec<u8>) -> ResponseBody {
    Full::new(Bytes::from(bytes)).boxed()
}

/// A body backed by an mpsc channel — the SSE handler's sink pushes
/// frames into it from whatever task calls `Broadcaster::broadcast`.
pub struct ChannelBody {
    rx: mpsc::Receiver<Bytes>,
}

impl ChannelBody {
    pub fn new(rx: mpsc::Receiver<Bytes>) -> Self {
        Self { rx }
    }

    pub fn boxed(self) -> ResponseBody {
        BodyExt::boxed(self)
    }
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut().rx.poll_recv(cx) {
            Poll::Ready(Some(chunk)) => Poll::Ready(Some(Ok(Frame::data(chunk)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
