//! Integration tests for the dedup + aggregate transaction against a real
//! Postgres instance, spun up per-test by `#[sqlx::test]`.

use qoe_common::{window_start_ts, ErrorStage, TelemetryEvent};
use sqlx::PgPool;
use uuid::Uuid;

use super::queries::{apply_event, count_events_seen, find_aggregate};

const LATE_TOLERANCE_MS: i64 = 120_000;

fn event(event_id: Uuid, client_id: &str, target: &str, ts_ms: i64) -> TelemetryEvent {
    TelemetryEvent {
        event_id: event_id.to_string(),
        client_id: client_id.to_string(),
        target: target.to_string(),
        ts_ms,
        dns_ms: Some(5.0),
        tcp_ms: Some(10.0),
        tls_ms: Some(20.0),
        http_ttfb_ms: Some(42.0),
        throughput_kbps: None,
        error_stage: None,
        trace_parent: None,
        trace_state: None,
    }
}

async fn apply(pool: &PgPool, ev: &TelemetryEvent, recv_ts_ms: i64) -> bool {
    let event_id = ev.validate().unwrap();
    let mut tx = pool.begin().await.unwrap();
    let outcome = apply_event(&mut tx, event_id, ev, recv_ts_ms, LATE_TOLERANCE_MS)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    outcome.is_new
}

/// Scenario 1: a single accepted event produces one aggregate row with
/// counters (1, 1, 0) in the window its ts_ms belongs to.
#[sqlx::test]
async fn scenario_single_event_creates_one_row(pool: PgPool) {
    let id = Uuid::new_v4();
    let ev = event(id, "C", "https://example.com", 1_703_297_130_500);

    assert!(apply(&pool, &ev, ev.ts_ms).await);

    let row = find_aggregate(&pool, "C", "https://example.com", 1_703_297_100_000)
        .await
        .unwrap()
        .expect("aggregate row must exist");
    assert_eq!((row.count_total, row.count_success, row.count_error), (1, 1, 0));
}

/// Scenario 2 / P1: retrying the same event three times leaves the
/// aggregate row unchanged after the first application.
#[sqlx::test]
async fn scenario_retry_is_idempotent(pool: PgPool) {
    let id = Uuid::new_v4();
    let ev = event(id, "C", "https://example.com", 1_703_297_130_500);

    assert!(apply(&pool, &ev, ev.ts_ms).await);
    for _ in 0..3 {
        assert!(!apply(&pool, &ev, ev.ts_ms).await);
    }

    let row = find_aggregate(&pool, "C", "https://example.com", 1_703_297_100_000)
        .await
        .unwrap()
        .unwrap();
    assert_eq!((row.count_total, row.count_success, row.count_error), (1, 1, 0));
    assert_eq!(count_events_seen(&pool, id).await.unwrap(), 1);
}

/// Scenario 3: two events in the same (client, target) but different
/// minutes land in two distinct aggregate rows.
#[sqlx::test]
async fn scenario_different_windows_produce_two_rows(pool: PgPool) {
    let ev_a = event(Uuid::new_v4(), "C", "https://example.com", 1_703_297_130_500);
    let ev_b = event(Uuid::new_v4(), "C", "https://example.com", 1_703_297_160_000);

    assert!(apply(&pool, &ev_a, ev_a.ts_ms).await);
    assert!(apply(&pool, &ev_b, ev_b.ts_ms).await);

    assert!(find_aggregate(&pool, "C", "https://example.com", 1_703_297_100_000)
        .await
        .unwrap()
        .is_some());
    assert!(find_aggregate(&pool, "C", "https://example.com", 1_703_297_160_000)
        .await
        .unwrap()
        .is_some());
}

/// Scenario 4: a failed event increments count_error, not count_success.
#[sqlx::test]
async fn scenario_failed_event_counts_as_error(pool: PgPool) {
    let mut ev = event(Uuid::new_v4(), "C", "https://example.com", 1_703_297_130_500);
    ev.error_stage = Some(ErrorStage::Tcp);
    ev.http_ttfb_ms = None;

    assert!(apply(&pool, &ev, ev.ts_ms).await);

    let row = find_aggregate(&pool, "C", "https://example.com", 1_703_297_100_000)
        .await
        .unwrap()
        .unwrap();
    assert_eq!((row.count_total, row.count_success, row.count_error), (1, 0, 1));
}

/// Scenario 5: an event submitted three minutes after its ts_ms is applied
/// to its original window and tagged late, without affecting counters.
#[sqlx::test]
async fn scenario_late_event_is_tagged_but_still_counted(pool: PgPool) {
    let ev = event(Uuid::new_v4(), "C", "https://example.com", 1_703_297_130_500);
    let recv_ts_ms = ev.ts_ms + 180_000;

    let event_id = ev.validate().unwrap();
    let mut tx = pool.begin().await.unwrap();
    apply_event(&mut tx, event_id, &ev, recv_ts_ms, LATE_TOLERANCE_MS)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let row = find_aggregate(&pool, "C", "https://example.com", 1_703_297_100_000)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.count_total, 1);

    let late_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM late_events WHERE event_id = $1")
        .bind(event_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(late_count, 1);
}

/// P2: count_total always equals count_success + count_error after any
/// sequence of applications, success or failure.
#[sqlx::test]
async fn p2_counter_consistency(pool: PgPool) {
    let target = "https://example.com";
    for i in 0..5 {
        let mut ev = event(Uuid::new_v4(), "C", target, 1_703_297_130_500);
        if i % 2 == 0 {
            ev.error_stage = Some(ErrorStage::Http);
            ev.http_ttfb_ms = None;
        }
        assert!(apply(&pool, &ev, ev.ts_ms).await);
    }

    let row = find_aggregate(&pool, "C", target, window_start_ts(1_703_297_130_500))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.count_total, row.count_success + row.count_error);
    assert_eq!(row.count_total, 5);
}

/// P3: a rolled-back transaction leaves no trace in either table.
#[sqlx::test]
async fn p3_rollback_leaves_no_row(pool: PgPool) {
    let id = Uuid::new_v4();
    let ev = event(id, "C", "https://example.com", 1_703_297_130_500);
    let event_id = ev.validate().unwrap();

    let mut tx = pool.begin().await.unwrap();
    apply_event(&mut tx, event_id, &ev, ev.ts_ms, LATE_TOLERANCE_MS)
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(count_events_seen(&pool, id).await.unwrap(), 0);
    assert!(find_aggregate(&pool, "C", "https://example.com", 1_703_297_100_000)
        .await
        .unwrap()
        .is_none());
}

/// P4: window alignment vectors from the design, exercised through a real
/// write rather than just the pure function in `qoe-common`.
#[sqlx::test]
async fn p4_window_assignment_vectors(pool: PgPool) {
    let cases = [
        (1_703_297_100_000_i64, 1_703_297_100_000_i64),
        (1_703_297_130_500, 1_703_297_100_000),
        (1_703_297_159_999, 1_703_297_100_000),
        (1_703_297_160_000, 1_703_297_160_000),
    ];
    for (ts_ms, expected_window) in cases {
        let ev = event(Uuid::new_v4(), "C", "https://example.com", ts_ms);
        assert!(apply(&pool, &ev, ts_ms).await);
        assert!(find_aggregate(&pool, "C", "https://example.com", expected_window)
            .await
            .unwrap()
            .is_some());
    }
}

/// P5: ages of 30s, 60s, 120s are on-time (at or below `late_tolerance_ms`);
/// 180s and 600s are late. One event per age, each its own `event_id` so
/// dedup never interferes.
#[sqlx::test]
async fn p5_late_tolerance_boundary_vectors(pool: PgPool) {
    let cases = [
        (30_000_i64, false),
        (60_000, false),
        (120_000, false),
        (180_000, true),
        (600_000, true),
    ];

    for (age_ms, expect_late) in cases {
        let ev = event(Uuid::new_v4(), "C", "https://example.com", 1_703_297_130_500);
        let recv_ts_ms = ev.ts_ms + age_ms;
        let event_id = ev.validate().unwrap();

        let mut tx = pool.begin().await.unwrap();
        apply_event(&mut tx, event_id, &ev, recv_ts_ms, LATE_TOLERANCE_MS)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let late_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM late_events WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(
            late_count,
            i64::from(expect_late),
            "age {age_ms}ms: expected late={expect_late}"
        );
    }
}

/// P7: N concurrent attempts to ingest the same event_id yield exactly one
/// events_seen row and exactly one aggregate increment.
#[sqlx::test]
async fn p7_concurrent_dedup(pool: PgPool) {
    let id = Uuid::new_v4();
    let ev = event(id, "C", "https://example.com", 1_703_297_130_500);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let ev = ev.clone();
        handles.push(tokio::spawn(async move { apply(&pool, &ev, ev.ts_ms).await }));
    }

    let mut new_count = 0;
    for h in handles {
        if h.await.unwrap() {
            new_count += 1;
        }
    }
    assert_eq!(new_count, 1);

    assert_eq!(count_events_seen(&pool, id).await.unwrap(), 1);
    let row = find_aggregate(&pool, "C", "https://example.com", 1_703_297_100_000)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.count_total, 1);
}
