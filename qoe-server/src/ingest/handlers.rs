//! HTTP handlers for the ingest gateway's three routes.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use qoe_common::SubmitRequest;
use serde::{Deserialize, Serialize};

use super::pipeline::process_batch;
use super::AppState;
use crate::auth::AuthPrincipal;
use crate::db::{self, WindowSummary};
use crate::error::IngestError;

/// `POST /v1/events` — accept a batch of telemetry events.
///
/// Authentication is handled by the `require_auth` middleware layered onto
/// this route; `_principal` is accepted but unused beyond proving a valid
/// token was presented, since events carry their own `client_id`.
#[tracing::instrument(skip(state, body))]
pub async fn submit_events(
    State(state): State<AppState>,
    _principal: AuthPrincipal,
    Json(body): Json<SubmitRequest>,
) -> Result<impl IntoResponse, IngestError> {
    let recv_ts_ms = now_ms();
    let response = process_batch(
        &state.db,
        body.events,
        recv_ts_ms,
        state.config.late_tolerance_ms,
        Duration::from_millis(state.config.transaction_deadline_ms),
    )
    .await?;

    Ok(Json(response))
}

/// `GET /v1/health` — liveness probe; does not require authentication.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => Json(serde_json::json!({ "status": "ok" })).into_response(),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "unavailable", "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// Query parameters for `GET /v1/summary`.
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub client_id: String,
    pub target: String,
    pub from_window_ts: i64,
    pub to_window_ts: i64,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub windows: Vec<WindowSummary>,
}

/// `GET /v1/summary` — P50/P95 and counters per window for a (client, target)
/// pair over a window range.
#[tracing::instrument(skip(state))]
pub async fn summary(
    State(state): State<AppState>,
    _principal: AuthPrincipal,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, IngestError> {
    let aggregates = db::list_aggregates(
        &state.db,
        &query.client_id,
        &query.target,
        query.from_window_ts,
        query.to_window_ts,
    )
    .await
    .map_err(|_| IngestError::Unavailable)?;

    let windows = aggregates.into_iter().map(WindowSummary::from).collect();
    Ok(Json(SummaryResponse { windows }))
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
