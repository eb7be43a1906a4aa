//! The wire schema shared between the probe and the ingest gateway.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Which measurement stage a failed event stopped at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStage {
    Parse,
    Dns,
    Tcp,
    Tls,
    Http,
    Throughput,
}

/// One completed or failed measurement, as sent by a probe.
///
/// `event_id` and the numeric fields are kept loosely typed (`String`,
/// `Option<f64>`) rather than `Uuid`/strict-validated on the wire: a single
/// malformed event must not poison deserialization of the whole batch, so
/// structural parsing is deliberately permissive and [`TelemetryEvent::validate`]
/// carries the actual checks required by the ingest gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event_id: String,
    pub client_id: String,
    pub target: String,
    pub ts_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_ttfb_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput_kbps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stage: Option<ErrorStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_state: Option<String>,
}

/// A rejected event, with a human-readable reason, at a given batch index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEvent {
    pub index: usize,
    pub reason: String,
}

/// `POST /v1/events` request body.
///
/// Events are held as raw JSON, not `Vec<TelemetryEvent>`: one event with the
/// wrong shape must fail only that index, not the whole array's
/// deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub events: Vec<serde_json::Value>,
}

/// `POST /v1/events` response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub accepted: u32,
    pub deduped: u32,
    pub failed: Vec<FailedEvent>,
}

/// Why a `TelemetryEvent` failed validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("event_id is not a well-formed UUID")]
    BadEventId,
    #[error("client_id must not be empty")]
    EmptyClientId,
    #[error("target must not be empty")]
    EmptyTarget,
    #[error("ts_ms must be non-negative")]
    NegativeTimestamp,
    #[error("{0} must be a finite non-negative number")]
    NegativeMetric(&'static str),
}

impl TelemetryEvent {
    /// Whether this event represents a successful measurement.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error_stage.is_none()
    }

    /// Validate required fields per the ingest gateway's contract, returning
    /// the parsed `event_id` on success.
    pub fn validate(&self) -> Result<Uuid, ValidationError> {
        let event_id = Uuid::parse_str(&self.event_id).map_err(|_| ValidationError::BadEventId)?;

        if self.client_id.is_empty() {
            return Err(ValidationError::EmptyClientId);
        }
        if self.target.is_empty() {
            return Err(ValidationError::EmptyTarget);
        }
        if self.ts_ms < 0 {
            return Err(ValidationError::NegativeTimestamp);
        }

        check_metric("dns_ms", self.dns_ms)?;
        check_metric("tcp_ms", self.tcp_ms)?;
        check_metric("tls_ms", self.tls_ms)?;
        check_metric("http_ttfb_ms", self.http_ttfb_ms)?;
        check_metric("throughput_kbps", self.throughput_kbps)?;

        Ok(event_id)
    }
}

fn check_metric(name: &'static str, value: Option<f64>) -> Result<(), ValidationError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ValidationError::NegativeMetric(name)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_event() -> TelemetryEvent {
        TelemetryEvent {
            event_id: Uuid::new_v4().to_string(),
            client_id: "probe-abc123".into(),
            target: "https://example.com".into(),
            ts_ms: 1_703_297_130_500,
            dns_ms: Some(5.2),
            tcp_ms: Some(12.1),
            tls_ms: Some(30.0),
            http_ttfb_ms: Some(42.0),
            throughput_kbps: None,
            error_stage: None,
            trace_parent: None,
            trace_state: None,
        }
    }

    #[test]
    fn valid_event_passes() {
        assert!(base_event().validate().is_ok());
    }

    #[test]
    fn bad_uuid_is_rejected() {
        let mut e = base_event();
        e.event_id = "not-a-uuid".into();
        assert_eq!(e.validate().unwrap_err(), ValidationError::BadEventId);
    }

    #[test]
    fn negative_metric_is_rejected() {
        let mut e = base_event();
        e.http_ttfb_ms = Some(-1.0);
        assert!(matches!(
            e.validate().unwrap_err(),
            ValidationError::NegativeMetric("http_ttfb_ms")
        ));
    }

    #[test]
    fn failed_event_is_not_success() {
        let mut e = base_event();
        e.error_stage = Some(ErrorStage::Tcp);
        assert!(!e.is_success());
    }

    #[test]
    fn deserializes_from_minimal_json() {
        let json = serde_json::json!({
            "event_id": Uuid::new_v4().to_string(),
            "client_id": "probe-abc",
            "target": "https://example.com",
            "ts_ms": 1_703_297_130_500_i64,
        });
        let event: TelemetryEvent = serde_json::from_value(json).unwrap();
        assert!(event.dns_ms.is_none());
        assert!(event.validate().is_ok());
    }
}
