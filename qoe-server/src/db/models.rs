//! Database row types for the dedup store, aggregate store, and late-event
//! side table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A row in `events_seen` — the dedup record for one `event_id`.
#[derive(Debug, Clone, FromRow)]
pub struct EventSeen {
    pub event_id: Uuid,
    pub client_id: String,
    pub ts_ms: i64,
    pub seen_at: DateTime<Utc>,
}

/// A row in `agg_1m` — counters and the latency reservoir for one
/// (client, target, window) triple.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WindowedAggregate {
    pub client_id: String,
    pub target: String,
    pub window_start_ts: i64,
    pub count_total: i64,
    pub count_success: i64,
    pub count_error: i64,
    pub latency_samples_ms: Vec<f64>,
}

impl WindowedAggregate {
    /// P50 latency over the stored reservoir, or `None` if no successful
    /// sample has landed in this window yet.
    #[must_use]
    pub fn p50(&self) -> Option<f64> {
        qoe_common::percentile(&self.latency_samples_ms, 50.0)
    }

    /// P95 latency over the stored reservoir, or `None` if no successful
    /// sample has landed in this window yet.
    #[must_use]
    pub fn p95(&self) -> Option<f64> {
        qoe_common::percentile(&self.latency_samples_ms, 95.0)
    }
}

/// A row in `late_events`.
#[derive(Debug, Clone, FromRow)]
pub struct LateEvent {
    pub event_id: Uuid,
    pub latency_ms: i64,
    pub classified_at: DateTime<Utc>,
}

/// A single window in a `GET /v1/summary` response, with percentiles
/// precomputed server-side.
#[derive(Debug, Clone, Serialize)]
pub struct WindowSummary {
    pub client_id: String,
    pub target: String,
    pub window_start_ts: i64,
    pub count_total: i64,
    pub count_success: i64,
    pub count_error: i64,
    pub p50_ttfb_ms: Option<f64>,
    pub p95_ttfb_ms: Option<f64>,
}

impl From<WindowedAggregate> for WindowSummary {
    fn from(agg: WindowedAggregate) -> Self {
        Self {
            p50_ttfb_ms: agg.p50(),
            p95_ttfb_ms: agg.p95(),
            client_id: agg.client_id,
            target: agg.target,
            window_start_ts: agg.window_start_ts,
            count_total: agg.count_total,
            count_success: agg.count_success,
            count_error: agg.count_error,
        }
    }
}
