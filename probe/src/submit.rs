//! HTTPS submission client: posts batches of [`TelemetryEvent`]s to the
//! ingest gateway's `POST /v1/events`, retrying on a `503` the way the
//! teacher's webhook delivery worker retries a failed delivery — a fixed
//! backoff table plus a bounded attempt count — since the Measurement
//! Engine itself performs no internal retries (§4.1 supplement).

use std::time::Duration;

use qoe_common::{SubmitRequest, SubmitResponse, TelemetryEvent};
use thiserror::Error;
use tracing::{error, warn};

/// Maximum submission attempts before giving up on a batch.
const MAX_ATTEMPTS: u32 = 4;

/// Backoff delays between retries, mirroring the exponential table the
/// teacher uses for webhook redelivery, trimmed to the probe's smaller
/// retry budget.
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(5),
    Duration::from_secs(20),
];

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("ingest gateway rejected the batch with status {0}")]
    Rejected(reqwest::StatusCode),
}

pub struct SubmitClient {
    http: reqwest::Client,
    ingest_url: String,
    auth_token: String,
}

impl SubmitClient {
    #[must_use]
    pub fn new(ingest_url: String, auth_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            ingest_url,
            auth_token,
        }
    }

    /// Submit one batch, retrying on `503`/connection errors per the
    /// backoff table above. `429` is also retryable (backpressure); `401`
    /// and any other client error are not.
    pub async fn submit(&self, events: Vec<TelemetryEvent>) -> Result<SubmitResponse, SubmitError> {
        let body = SubmitRequest {
            events: events
                .into_iter()
                .map(|e| serde_json::to_value(e).expect("TelemetryEvent always serializes"))
                .collect(),
        };

        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.try_submit(&body).await {
                Ok(response) => return Ok(response),
                Err(SubmitError::Rejected(status))
                    if status.as_u16() == 503 || status.as_u16() == 429 =>
                {
                    warn!(attempt, %status, "ingest gateway backpressure, retrying");
                    last_err = Some(SubmitError::Rejected(status));
                }
                Err(SubmitError::Request(e)) if e.is_timeout() || e.is_connect() => {
                    warn!(attempt, error = %e, "submission transport error, retrying");
                    last_err = Some(SubmitError::Request(e));
                }
                Err(e) => {
                    error!(error = %e, "submission rejected, not retrying");
                    return Err(e);
                }
            }

            if let Some(delay) = RETRY_DELAYS.get(attempt as usize) {
                tokio::time::sleep(*delay).await;
            }
        }

        Err(last_err.expect("loop always attempts at least once"))
    }

    async fn try_submit(&self, body: &SubmitRequest) -> Result<SubmitResponse, SubmitError> {
        let response = self
            .http
            .post(format!("{}/v1/events", self.ingest_url))
            .bearer_auth(&self.auth_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmitError::Rejected(status));
        }

        Ok(response.json::<SubmitResponse>().await?)
    }
}
