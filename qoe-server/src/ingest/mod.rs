//! The Ingest Gateway's HTTP surface: `AppState` plus the `axum::Router` it
//! backs, laid out the way the teacher's `api::create_router`/`AppState`
//! pair is — a small state struct threaded through `with_state`, with
//! `tower-http`'s trace/compression/request-id layers applied uniformly.

mod handlers;
mod pipeline;

use std::sync::Arc;

use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use tower_http::compression::CompressionLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_auth;
use crate::config::Config;

/// Shared application state for all ingest gateway handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(db: PgPool, config: Config) -> Self {
        Self { db, config: Arc::new(config) }
    }
}

/// Build the gateway's router: `POST /v1/events` and `GET /v1/summary`
/// require a bearer token; `GET /v1/health` does not.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/events", post(handlers::submit_events))
        .route("/v1/summary", get(handlers::summary))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    let public = Router::new().route("/v1/health", get(handlers::health));

    protected
        .merge(public)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
