use std::time::Duration;

use curl::easy::Easy;
use qoe_common::event::ErrorStage;
use qoe_common::TelemetryEvent;
use uuid::Uuid;

use super::{MeasureConfig, MeasureError};

/// Download a fixed-size object from `target` on a fresh, uncompressed
/// connection with cache-busting headers, and report `throughput_kbps`.
///
/// Runs on its own interval, independent of [`super::measure_target`]'s: the
/// spec describes it as "a separate call, fresh connection," not a field
/// folded into the regular measurement.
pub async fn measure_throughput(
    target: &str,
    config: &MeasureConfig,
    deadline: Duration,
) -> Result<TelemetryEvent, MeasureError> {
    let ts_ms = chrono::Utc::now().timestamp_millis();
    let event_id = Uuid::new_v4().to_string();
    let url = cache_busted(target);
    let url_for_task = url.clone();

    let result = tokio::task::spawn_blocking(move || download(&url_for_task, deadline)).await?;

    Ok(match result {
        Ok(kbps) => TelemetryEvent {
            event_id,
            client_id: config.client_id.clone(),
            target: target.to_string(),
            ts_ms,
            dns_ms: None,
            tcp_ms: None,
            tls_ms: None,
            http_ttfb_ms: None,
            throughput_kbps: Some(kbps),
            error_stage: None,
            trace_parent: None,
            trace_state: None,
        },
        Err(()) => TelemetryEvent {
            event_id,
            client_id: config.client_id.clone(),
            target: target.to_string(),
            ts_ms,
            dns_ms: None,
            tcp_ms: None,
            tls_ms: None,
            http_ttfb_ms: None,
            throughput_kbps: None,
            error_stage: Some(ErrorStage::Throughput),
            trace_parent: None,
            trace_state: None,
        },
    })
}

fn cache_busted(target: &str) -> String {
    let sep = if target.contains('?') { '&' } else { '?' };
    format!("{target}{sep}_cb={}", Uuid::new_v4().simple())
}

fn download(url: &str, deadline: Duration) -> Result<f64, ()> {
    let mut handle = Easy::new();
    let mut bytes_read: u64 = 0;

    handle.url(url).map_err(|_| ())?;
    handle.get(true).ok();
    handle.timeout(deadline).ok();
    handle.fresh_connect(true).ok();
    handle.forbid_reuse(true).ok();
    // No compression: throughput must measure wire bytes, not decoded bytes.
    handle.accept_encoding("identity").ok();

    {
        let mut transfer = handle.transfer();
        transfer
            .write_function(|data| {
                bytes_read += data.len() as u64;
                Ok(data.len())
            })
            .map_err(|_| ())?;
        transfer.perform().map_err(|_| ())?;
    }

    let elapsed_s = handle.total_time().map_err(|_| ())?.as_secs_f64();
    if elapsed_s <= 0.0 || bytes_read == 0 {
        return Err(());
    }

    Ok((bytes_read as f64 * 8.0) / elapsed_s / 1000.0)
}
