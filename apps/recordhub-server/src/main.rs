//! Main REST API server for recordhub.
//!
//! Wires the environment-driven `Config`, a `MemoryKv` substrate, the
//! CRUD engine, and the HTTP router, then serves until interrupted,
//! draining the write buffer before exit.

use std::net::SocketAddr;
use std::sync::Arc;

use recordhub_api::{AppState, PlaintextVerifier, Router, Server};
use recordhub_core::kv::MemoryKv;
use recordhub_core::Config;
use recordhub_engine::Engine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let kv = Arc::new(MemoryKv::new());
    let engine = Arc::new(Engine::new(kv, config.clone()));

    let state = AppState {
        engine: engine.clone(),
        config: Arc::new(config),
        password_verifier: Arc::new(PlaintextVerifier),
    };
    let router = Router::new(state);
    let server = Server::new(addr, router);

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    server.serve(shutdown).await?;

    tracing::info!("draining write buffer before exit");
    engine.shutdown().await;
    Ok(())
}
