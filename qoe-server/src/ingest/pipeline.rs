//! Turns a raw batch of events into committed aggregate rows (§4.2, §4.3).
//!
//! Each event is processed independently: a malformed or duplicate event
//! never aborts its siblings. A transient storage failure is the one thing
//! that does abort the rest of the batch, per §4.5 ("no partial batch is
//! persisted" on database unavailability) — everything already committed
//! stays committed (each event's transaction already landed), but remaining
//! events are reported as failed so the caller retries the whole batch.

use std::time::Duration;

use qoe_common::{FailedEvent, SubmitResponse, TelemetryEvent};
use sqlx::PgPool;

use crate::db;
use crate::error::{transient_kind, IngestError};

/// Process one ingest batch, applying each event's dedup + aggregate
/// transaction and assembling the `{accepted, deduped, failed}` summary.
pub async fn process_batch(
    pool: &PgPool,
    raw_events: Vec<serde_json::Value>,
    recv_ts_ms: i64,
    late_tolerance_ms: i64,
    transaction_deadline: Duration,
) -> Result<SubmitResponse, IngestError> {
    let mut response = SubmitResponse::default();

    for (index, raw) in raw_events.into_iter().enumerate() {
        let event: TelemetryEvent = match serde_json::from_value(raw) {
            Ok(event) => event,
            Err(e) => {
                response.failed.push(FailedEvent { index, reason: e.to_string() });
                continue;
            }
        };

        let event_id = match event.validate() {
            Ok(id) => id,
            Err(e) => {
                response.failed.push(FailedEvent { index, reason: e.to_string() });
                continue;
            }
        };

        let outcome = tokio::time::timeout(transaction_deadline, async {
            let mut tx = pool.begin().await?;
            let outcome =
                db::apply_event(&mut tx, event_id, &event, recv_ts_ms, late_tolerance_ms).await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(outcome)
        })
        .await;

        match outcome {
            Ok(Ok(outcome)) if outcome.is_new => response.accepted += 1,
            Ok(Ok(_)) => response.deduped += 1,
            Ok(Err(e)) => match transient_kind(&e) {
                Some(transient) => return Err(transient),
                None => response.failed.push(FailedEvent { index, reason: e.to_string() }),
            },
            Err(_elapsed) => return Err(IngestError::Unavailable),
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn default_response_is_empty() {
        let r = SubmitResponse::default();
        assert_eq!(r.accepted, 0);
        assert_eq!(r.deduped, 0);
        assert!(r.failed.is_empty());
    }

    fn valid_event_json(client_id: &str, target: &str, ts_ms: i64) -> serde_json::Value {
        serde_json::json!({
            "event_id": Uuid::new_v4().to_string(),
            "client_id": client_id,
            "target": target,
            "ts_ms": ts_ms,
            "http_ttfb_ms": 42.0,
        })
    }

    /// Scenario 6: a batch of 10 events where the 5th is malformed — 9
    /// accepted, 1 in `failed[]`, and the malformed event never touches the
    /// other nine's transactions.
    #[sqlx::test]
    async fn scenario_malformed_event_does_not_poison_batch(pool: PgPool) {
        let mut batch: Vec<serde_json::Value> = (0..10)
            .map(|i| valid_event_json("C", "https://example.com", 1_703_297_130_500 + i))
            .collect();
        batch[4] = serde_json::json!({ "client_id": "C" }); // missing required fields

        let response = process_batch(&pool, batch, 1_703_297_131_000, 120_000, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(response.accepted, 9);
        assert_eq!(response.deduped, 0);
        assert_eq!(response.failed.len(), 1);
        assert_eq!(response.failed[0].index, 4);
    }
}
