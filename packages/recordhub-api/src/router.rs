//! Matchit routing configuration (§6: "bit-exact" REST surface).

use std::sync::Arc;

use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use matchit::Router as MatchitRouter;

use recordhub_core::{Config, KvStore};
use recordhub_engine::Engine;

use crate::auth::PasswordVerifier;
use crate::body::ResponseBody;
use crate::error::ApiError;
use crate::handlers;

/// Shared application state, constructed once in `apps/recordhub-server`
/// and cloned per connection (§9: explicit collaborator, not a global).
pub struct AppState<S: KvStore + 'static> {
    pub engine: Arc<Engine<S>>,
    pub config: Arc<Config>,
    pub password_verifier: Arc<dyn PasswordVerifier>,
}

impl<S: KvStore + 'static> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            config: self.config.clone(),
            password_verifier: self.password_verifier.clone(),
        }
    }
}

#[derive(Clone, Copy)]
enum Route {
    Login,
    Records,
    Record,
    Batch,
    Realtime,
    Stats,
    BufferStats,
    Health,
}

pub struct Router<S: KvStore + 'static> {
    inner: MatchitRouter<Route>,
    state: AppState<S>,
}

impl<S: KvStore + 'static> Router<S> {
    pub fn new(state: AppState<S>) -> Self {
        let mut router = MatchitRouter::new();
        router.insert("/api/auth/login", Route::Login).expect("route literal");
        router
            .insert("/api/collections/:collection/records", Route::Records)
            .expect("route literal");
        router
            .insert("/api/collections/:collection/records/:id", Route::Record)
            .expect("route literal");
        router.insert("/api/batch", Route::Batch).expect("route literal");
        router.insert("/api/realtime", Route::Realtime).expect("route literal");
        router.insert("/api/stats", Route::Stats).expect("route literal");
        router
            .insert("/api/stats/buffer", Route::BufferStats)
            .expect("route literal");
        router.insert("/health", Route::Health).expect("route literal");

        Self { inner: router, state }
    }

    pub async fn route(&self, req: Request<Incoming>) -> Response<ResponseBody> {
        let path = req.uri().path().to_string();
        match self.inner.at(&path) {
            Ok(matched) => {
                let route = *matched.value;
                let collection = matched.params.get("collection").map(str::to_string);
                let id = matched.params.get("id").map(str::to_string);
                self.dispatch(route, collection, id, req).await
            }
            Err(_) => ApiError::NotFound(format!("no route for {path}")).into_response(),
        }
    }

    async fn dispatch(
        &self,
        route: Route,
        collection: Option<String>,
        id: Option<String>,
        req: Request<Incoming>,
    ) -> Response<ResponseBody> {
        let state = self.state.clone();
        let result = match (route, req.method().clone(), id) {
            (Route::Login, Method::POST, _) => handlers::auth::login(req, state).await,
            (Route::Records, Method::GET, _) => {
                handlers::query::list(req, collection.expect("collection param"), state).await
            }
            (Route::Records, Method::POST, _) => {
                handlers::crud::create(req, collection.expect("collection param"), state).await
            }
            (Route::Record, Method::GET, Some(id)) => {
                handlers::crud::read(collection.expect("collection param"), id, state).await
            }
            (Route::Record, Method::PATCH, Some(id)) => {
                handlers::crud::update(req, collection.expect("collection param"), id, state).await
            }
            (Route::Record, Method::DELETE, Some(id)) => {
                handlers::crud::delete(req, collection.expect("collection param"), id, state).await
            }
            (Route::Batch, Method::POST, _) => handlers::batch::run(req, state).await,
            (Route::Realtime, Method::GET, _) => handlers::realtime::subscribe(state).await,
            (Route::Stats, Method::GET, _) => handlers::stats::stats(state).await,
            (Route::BufferStats, Method::GET, _) => handlers::stats::buffer_stats(state).await,
            (Route::Health, Method::GET, _) => handlers::stats::health().await,
            _ => Err(ApiError::BadRequest("method not allowed for this route".to_string())),
        };
        result.unwrap_or_else(|e| e.into_response())
    }
}
