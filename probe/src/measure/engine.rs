use std::time::Duration;

use curl::easy::{Easy, HttpVersion};
use qoe_common::event::ErrorStage;
use qoe_common::TelemetryEvent;
use thiserror::Error;
use uuid::Uuid;

use super::Stage;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_HTTP_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct MeasureConfig {
    pub connect_timeout: Duration,
    pub http_deadline: Duration,
    pub client_id: String,
}

impl MeasureConfig {
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            http_deadline: DEFAULT_HTTP_DEADLINE,
            client_id: client_id.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum MeasureError {
    #[error("failed to parse target URL")]
    Parse,
    #[error("measurement task panicked: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Derived phase durations read back from a single curl transfer.
///
/// `http_ttfb_ms` is named for the wire field it fills but, per §4.1's HTTP
/// stage definition (read headers, then drain the body to EOF), it spans
/// request-send through end-of-body, not just the first response byte — it
/// is measured off `total_time`, not `starttransfer_time`.
struct PhaseTimings {
    dns_ms: f64,
    tcp_ms: f64,
    tls_ms: f64,
    http_ttfb_ms: f64,
}

/// Run one measurement pass against `target`, returning a `TelemetryEvent`
/// regardless of outcome: a `DONE` transfer carries timings and no
/// `error_stage`; a `FAIL(stage)` transfer carries an `error_stage` and
/// whatever timings were obtained before the failure.
pub async fn measure_target(
    target: &str,
    config: &MeasureConfig,
) -> Result<TelemetryEvent, MeasureError> {
    let ts_ms = now_ms();
    let event_id = Uuid::new_v4().to_string();

    let url = match normalize_url(target) {
        Ok(url) => url,
        Err(()) => return Ok(failed_event(event_id, config, target, ts_ms, Stage::Parse, None)),
    };

    let connect_timeout = config.connect_timeout;
    let http_deadline = config.http_deadline;
    let url_for_task = url.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        run_transfer(&url_for_task, connect_timeout, http_deadline)
    })
    .await?;

    Ok(match outcome {
        Ok(timings) => TelemetryEvent {
            event_id,
            client_id: config.client_id.clone(),
            target: target.to_string(),
            ts_ms,
            dns_ms: Some(timings.dns_ms),
            tcp_ms: Some(timings.tcp_ms),
            tls_ms: Some(timings.tls_ms),
            http_ttfb_ms: Some(timings.http_ttfb_ms),
            throughput_kbps: None,
            error_stage: None,
            trace_parent: None,
            trace_state: None,
        },
        Err((stage, partial)) => failed_event(event_id, config, target, ts_ms, stage, partial),
    })
}

fn failed_event(
    event_id: String,
    config: &MeasureConfig,
    target: &str,
    ts_ms: i64,
    stage: Stage,
    partial: Option<PhaseTimings>,
) -> TelemetryEvent {
    TelemetryEvent {
        event_id,
        client_id: config.client_id.clone(),
        target: target.to_string(),
        ts_ms,
        dns_ms: partial.as_ref().map(|t| t.dns_ms),
        tcp_ms: partial.as_ref().map(|t| t.tcp_ms),
        tls_ms: partial.as_ref().map(|t| t.tls_ms),
        http_ttfb_ms: partial.as_ref().map(|t| t.http_ttfb_ms),
        throughput_kbps: None,
        error_stage: stage.as_error_stage().or(Some(ErrorStage::Parse)),
        trace_parent: None,
        trace_state: None,
    }
}

fn normalize_url(target: &str) -> Result<String, ()> {
    let parsed = if target.contains("://") {
        url::Url::parse(target).map_err(|_| ())?
    } else {
        url::Url::parse(&format!("https://{target}")).map_err(|_| ())?
    };
    if parsed.host_str().is_none() {
        return Err(());
    }
    Ok(parsed.into())
}

/// Perform one GET transfer and classify the outcome. Runs on a blocking
/// thread: `curl::easy::Easy` is synchronous.
fn run_transfer(
    url: &str,
    connect_timeout: Duration,
    http_deadline: Duration,
) -> Result<PhaseTimings, (Stage, Option<PhaseTimings>)> {
    let mut handle = Easy::new();
    let is_https = url.starts_with("https://");

    handle.url(url).map_err(|_| (Stage::Parse, None))?;
    handle.get(true).ok();
    handle.connect_timeout(connect_timeout).ok();
    handle.timeout(http_deadline).ok();
    handle.ssl_verify_peer(true).ok();
    handle.ssl_verify_host(true).ok();
    // No keep-alive: force a fresh connection per §4.1.
    handle.fresh_connect(true).ok();
    handle.forbid_reuse(true).ok();
    handle.http_version(HttpVersion::Any).ok();

    handle
        .write_function(|data| Ok(data.len()))
        .map_err(|_| (Stage::Http, None))?;

    if let Err(e) = handle.perform() {
        return Err((classify_curl_error(&e, is_https), None));
    }

    let dns_time = handle.namelookup_time().unwrap_or_default().as_secs_f64();
    let connect_time = handle.connect_time().unwrap_or_default().as_secs_f64();
    let appconnect_time = handle.appconnect_time().unwrap_or_default().as_secs_f64();
    let total_time = handle.total_time().unwrap_or_default().as_secs_f64();

    let dns_ms = (dns_time * 1000.0).max(0.0);
    let tcp_ms = ((connect_time - dns_time).max(0.0)) * 1000.0;
    let tls_anchor = if is_https { appconnect_time } else { connect_time };
    let tls_ms = if is_https {
        ((appconnect_time - connect_time).max(0.0)) * 1000.0
    } else {
        0.0
    };
    // Spans request-send through end-of-body read (§4.1), not first byte —
    // `total_time` covers the full transfer since `write_function` above
    // drains the body to EOF before curl considers the transfer complete.
    let http_ttfb_ms = ((total_time - tls_anchor).max(0.0)) * 1000.0;

    Ok(PhaseTimings {
        dns_ms,
        tcp_ms,
        tls_ms,
        http_ttfb_ms,
    })
}

fn classify_curl_error(e: &curl::Error, is_https: bool) -> Stage {
    if e.is_couldnt_resolve_host() || e.is_couldnt_resolve_proxy() {
        Stage::Dns
    } else if e.is_couldnt_connect() || e.is_operation_timedout() {
        Stage::Tcp
    } else if is_https
        && (e.is_ssl_connect_error()
            || e.is_ssl_certproblem()
            || e.is_ssl_cacert()
            || e.is_peer_failed_verification())
    {
        Stage::Tls
    } else {
        Stage::Http
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
