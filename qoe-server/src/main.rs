//! QoE Telemetry Server — Main Entry Point

use anyhow::Result;
use std::net::SocketAddr;
use tracing::info;

use qoe_server::{config, db, ingest, retention};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qoe_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting QoE telemetry server"
    );

    let db_pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&db_pool).await?;

    let _retention_handle =
        retention::spawn_retention_task(db_pool.clone(), config.dedup_retention_hours);

    let bind_address = config.bind_address.clone();
    let state = ingest::AppState::new(db_pool, config);
    let app = ingest::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "Ingest gateway listening");

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C signal handler");
        info!("received shutdown signal, cleaning up...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    info!("server shutdown complete");

    Ok(())
}
