//! Dedup store retention: expunges `events_seen` rows once they are older
//! than any possible retry horizon.
//!
//! Mirrors the teacher's `observability::retention::spawn_retention_task` —
//! an hourly tick, first tick consumed immediately so a restart storm
//! doesn't trigger a purge cycle during the server's initial request burst.

use std::time::{Duration, Instant};

use sqlx::PgPool;

use crate::db::purge_old_events_seen;

/// Start the hourly dedup-retention background task.
///
/// The returned `JoinHandle` should be stored alongside other background
/// task handles in `main` and aborted on graceful shutdown.
pub fn spawn_retention_task(pool: PgPool, retention_hours: i64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        interval.tick().await; // consume immediate first tick
        loop {
            interval.tick().await;
            run_retention_cycle(&pool, retention_hours).await;
        }
    })
}

#[tracing::instrument(skip(pool))]
async fn run_retention_cycle(pool: &PgPool, retention_hours: i64) {
    let start = Instant::now();
    match purge_old_events_seen(pool, retention_hours).await {
        Ok(deleted) => {
            tracing::info!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                deleted,
                "dedup store retention cycle completed"
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "dedup store retention cycle failed");
        }
    }
}
