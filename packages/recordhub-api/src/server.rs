//! Hyper server setup and request dispatch.

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnectionBuilder;
use tokio::net::TcpListener;

use recordhub_core::KvStore;

use crate::router::Router;

pub struct Server<S: KvStore + 'static> {
    addr: SocketAddr,
    router: Arc<Router<S>>,
}

impl<S: KvStore + 'static> Server<S> {
    pub fn new(addr: SocketAddr, router: Router<S>) -> Self {
        Self {
            addr,
            router: Arc::new(router),
        }
    }

    /// Serves until `shutdown` resolves, then stops accepting new
    /// connections (graceful shutdown is the caller's job — see
    /// `apps/recordhub-server`, which drains the engine afterwards).
    pub async fn serve(self, shutdown: impl std::future::Future<Output = ()>) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!("recordhub-api listening on http://{}", self.addr);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, _) = accepted?;
                    let io = TokioIo::new(stream);
                    let router = self.router.clone();
                    tokio::spawn(async move {
                        let builder = ConnectionBuilder::new(TokioExecutor::new());
                        let service = hyper::service::service_fn(move |req: Request<hyper::body::Incoming>| {
                            let router = router.clone();
                            async move { Ok::<_, std::convert::Infallible>(router.route(req).await) }
                        });
                        if let Err(err) = builder.serve_connection(io, service).await {
                            tracing::warn!("connection error: {err}");
                        }
                    });
                }
                _ = &mut shutdown => {
                    tracing::info!("recordhub-api: shutdown signal received, no longer accepting connections");
                    return Ok(());
                }
            }
        }
    }
}
