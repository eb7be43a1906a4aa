//! Database Layer
//!
//! `PostgreSQL` connection pool, migrations, and the dedup/aggregate/summary
//! queries that back the ingest pipeline.

mod models;
mod queries;

#[cfg(test)]
mod tests;

use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

pub use models::{EventSeen, LateEvent, WindowSummary, WindowedAggregate};
pub use queries::{
    apply_event, count_events_seen, find_aggregate, list_aggregates, purge_old_events_seen,
    ApplyOutcome, LATENCY_RESERVOIR_CAP,
};

/// Create `PostgreSQL` connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await?;

    info!("Connected to PostgreSQL");
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}
