//! QoE Measurement Probe — Main Entry Point

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use qoe_probe::config::Cli;
use qoe_probe::identity;
use qoe_probe::measure::{measure_target, measure_throughput, MeasureConfig};
use qoe_probe::submit::SubmitClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qoe_probe=info".into()),
        )
        .json()
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let client_id = identity::resolve_client_id().await?;
    info!(client_id = %client_id, targets = cli.targets.len(), "starting probe");

    let measure_config = Arc::new(MeasureConfig::new(client_id));
    let submit_client = Arc::new(SubmitClient::new(cli.ingest_url.clone(), cli.auth_token.clone()));
    let targets: Arc<Vec<String>> = Arc::new(cli.targets.clone());

    if cli.once {
        run_measurement_pass(&targets, &measure_config, &submit_client).await;
        return Ok(());
    }

    let throughput_handle = cli.throughput_interval().map(|interval| {
        tokio::spawn(throughput_loop(
            targets.clone(),
            measure_config.clone(),
            submit_client.clone(),
            interval,
        ))
    });

    let _throughput_handle = throughput_handle;

    let mut ticker = tokio::time::interval(cli.measurement_interval());
    ticker.tick().await; // consume the immediate first tick
    loop {
        ticker.tick().await;
        run_measurement_pass(&targets, &measure_config, &submit_client).await;
    }
}

async fn run_measurement_pass(
    targets: &[String],
    config: &MeasureConfig,
    submit_client: &SubmitClient,
) {
    let mut events = Vec::with_capacity(targets.len());
    for target in targets {
        match measure_target(target, config).await {
            Ok(event) => events.push(event),
            Err(e) => error!(probe_target = %target, error = %e, "measurement task failed"),
        }
    }

    if events.is_empty() {
        return;
    }

    match submit_client.submit(events).await {
        Ok(response) => info!(
            accepted = response.accepted,
            deduped = response.deduped,
            failed = response.failed.len(),
            "submitted measurement batch"
        ),
        Err(e) => error!(error = %e, "failed to submit measurement batch"),
    }
}

async fn throughput_loop(
    targets: Arc<Vec<String>>,
    config: Arc<MeasureConfig>,
    submit_client: Arc<SubmitClient>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let mut events = Vec::with_capacity(targets.len());
        for target in targets.iter() {
            match measure_throughput(target, &config, Duration::from_secs(30)).await {
                Ok(event) => events.push(event),
                Err(e) => error!(probe_target = %target, error = %e, "throughput measurement failed"),
            }
        }
        if events.is_empty() {
            continue;
        }
        if let Err(e) = submit_client.submit(events).await {
            error!(error = %e, "failed to submit throughput batch");
        }
    }
}
