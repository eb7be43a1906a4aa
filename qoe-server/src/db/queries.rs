//! The dedup + aggregate transaction (§4.3 of the design) and the read
//! queries used by the summary service and the retention job.
//!
//! Runtime-checked queries (`sqlx::query`/`query_as`), not compile-time
//! macros: these tables are created by `migrations/`, not present in an
//! offline sqlx cache, matching the convention the rest of this codebase
//! uses for tables outside the original schema.

use qoe_common::{window_start_ts, TelemetryEvent};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::models::WindowedAggregate;

/// Samples above this count per window are dropped rather than merged,
/// bounding the size of `latency_samples_ms`. All values are exact below the
/// cap; above it, the window's percentiles are computed from a prefix of the
/// true sample set rather than the whole stream. See DESIGN.md for why this
/// was chosen over an unbounded array or a streaming sketch.
pub const LATENCY_RESERVOIR_CAP: i64 = 2000;

/// Outcome of applying one event to the dedup + aggregate pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// `true` if this `event_id` had not been seen before; `false` if it was
    /// a duplicate and no further writes were made.
    pub is_new: bool,
}

/// Apply one validated event to the dedup store and the aggregate store
/// inside an already-open transaction. Does not commit; the caller controls
/// the transaction's lifetime and deadline.
///
/// Implements §4.3 steps 1–4 in order: dedup insert, window assignment,
/// aggregate upsert, late-event classification.
pub async fn apply_event(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
    event: &TelemetryEvent,
    recv_ts_ms: i64,
    late_tolerance_ms: i64,
) -> Result<ApplyOutcome, sqlx::Error> {
    let inserted: Option<Uuid> = sqlx::query_scalar(
        "INSERT INTO events_seen (event_id, client_id, ts_ms) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (event_id) DO NOTHING \
         RETURNING event_id",
    )
    .bind(event_id)
    .bind(&event.client_id)
    .bind(event.ts_ms)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(_) = inserted else {
        return Ok(ApplyOutcome { is_new: false });
    };

    let window_start = window_start_ts(event.ts_ms);
    let success = event.is_success();
    let latency_sample = if success { event.http_ttfb_ms } else { None };

    sqlx::query(
        "INSERT INTO agg_1m \
             (client_id, target, window_start_ts, count_total, count_success, count_error, latency_samples_ms) \
         VALUES \
             ($1, $2, $3, 1, $4, $5, CASE WHEN $6::double precision IS NULL THEN ARRAY[]::double precision[] ELSE ARRAY[$6] END) \
         ON CONFLICT (client_id, target, window_start_ts) DO UPDATE SET \
             count_total = agg_1m.count_total + 1, \
             count_success = agg_1m.count_success + EXCLUDED.count_success, \
             count_error = agg_1m.count_error + EXCLUDED.count_error, \
             latency_samples_ms = CASE \
                 WHEN $6::double precision IS NULL THEN agg_1m.latency_samples_ms \
                 WHEN COALESCE(array_length(agg_1m.latency_samples_ms, 1), 0) < $7 \
                     THEN array_append(agg_1m.latency_samples_ms, $6) \
                 ELSE agg_1m.latency_samples_ms \
             END",
    )
    .bind(&event.client_id)
    .bind(&event.target)
    .bind(window_start)
    .bind(i64::from(success))
    .bind(i64::from(!success))
    .bind(latency_sample)
    .bind(LATENCY_RESERVOIR_CAP)
    .execute(&mut **tx)
    .await?;

    let latency_ms = recv_ts_ms - event.ts_ms;
    if latency_ms > late_tolerance_ms {
        sqlx::query(
            "INSERT INTO late_events (event_id, latency_ms) VALUES ($1, $2) \
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(event_id)
        .bind(latency_ms)
        .execute(&mut **tx)
        .await?;
    }

    Ok(ApplyOutcome { is_new: true })
}

/// Fetch a single aggregate row, for tests and point lookups.
pub async fn find_aggregate(
    pool: &PgPool,
    client_id: &str,
    target: &str,
    window_start_ts: i64,
) -> Result<Option<WindowedAggregate>, sqlx::Error> {
    sqlx::query_as(
        "SELECT client_id, target, window_start_ts, count_total, count_success, count_error, latency_samples_ms \
         FROM agg_1m WHERE client_id = $1 AND target = $2 AND window_start_ts = $3",
    )
    .bind(client_id)
    .bind(target)
    .bind(window_start_ts)
    .fetch_optional(pool)
    .await
}

/// Fetch aggregate rows for a client/target over a window range, ordered by
/// window start, for the summary service.
pub async fn list_aggregates(
    pool: &PgPool,
    client_id: &str,
    target: &str,
    from_window_ts: i64,
    to_window_ts: i64,
) -> Result<Vec<WindowedAggregate>, sqlx::Error> {
    sqlx::query_as(
        "SELECT client_id, target, window_start_ts, count_total, count_success, count_error, latency_samples_ms \
         FROM agg_1m \
         WHERE client_id = $1 AND target = $2 \
           AND window_start_ts >= $3 AND window_start_ts < $4 \
         ORDER BY window_start_ts ASC",
    )
    .bind(client_id)
    .bind(target)
    .bind(from_window_ts)
    .bind(to_window_ts)
    .fetch_all(pool)
    .await
}

/// Count how many `events_seen` rows exist for an `event_id` (0 or 1);
/// used by tests asserting dedup idempotence.
pub async fn count_events_seen(pool: &PgPool, event_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM events_seen WHERE event_id = $1")
        .bind(event_id)
        .fetch_one(pool)
        .await
}

/// Delete `events_seen` rows older than `retention_hours`, in batches, to
/// bound lock duration on a busy table. Mirrors the teacher's
/// `purge_in_batches` helper in `observability::retention`.
pub async fn purge_old_events_seen(pool: &PgPool, retention_hours: i64) -> Result<i64, sqlx::Error> {
    const BATCH_SIZE: i64 = 10_000;
    let mut total_deleted: i64 = 0;
    loop {
        let result = sqlx::query(
            "DELETE FROM events_seen WHERE event_id IN ( \
                 SELECT event_id FROM events_seen \
                 WHERE seen_at < NOW() - make_interval(hours => $1) LIMIT $2 \
             )",
        )
        .bind(retention_hours)
        .bind(BATCH_SIZE)
        .execute(pool)
        .await?;

        let deleted = result.rows_affected() as i64;
        total_deleted += deleted;
        if deleted < BATCH_SIZE {
            break;
        }
    }
    Ok(total_deleted)
}
