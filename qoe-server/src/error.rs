//! Ingest gateway error taxonomy (§7). One enum per module boundary, each
//! variant mapped to an HTTP status the way the teacher's `*Error` enums do.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Batch/request-level ingest errors. Per-event validation and duplicate
/// outcomes are *not* represented here — they are reported in
/// `SubmitResponse.failed`/`.deduped`, never raised as an `IngestError`,
/// matching §7's "duplicate is not an error" rule.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Authentication failed for the whole batch.
    #[error(transparent)]
    Auth(#[from] crate::auth::AuthError),

    /// The connection pool is saturated (every connection checked out);
    /// retryable, shed load rather than a sign the database is down.
    #[error("ingest queue saturated")]
    Backpressure,

    /// The database itself is unreachable, or a transaction hit a
    /// serialization conflict; retryable, no partial batch was persisted.
    #[error("database unavailable")]
    Unavailable,

    /// Malformed request body (not a per-event validation failure — the
    /// JSON itself did not parse as `{ "events": [...] }`).
    #[error("malformed request body: {0}")]
    BadRequest(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        match self {
            Self::Auth(e) => e.into_response(),
            Self::Backpressure => (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", "1")],
                Json(ErrorBody {
                    error: "BACKPRESSURE".into(),
                    message: self.to_string(),
                }),
            )
                .into_response(),
            Self::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                [("Retry-After", "1")],
                Json(ErrorBody {
                    error: "DB_UNAVAILABLE".into(),
                    message: self.to_string(),
                }),
            )
                .into_response(),
            Self::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: "BAD_REQUEST".into(),
                    message: self.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

/// Whether a storage error is transient (connection loss, pool exhaustion,
/// serialization conflict) as opposed to permanent (schema/constraint
/// violation other than the dedup uniqueness check).
///
/// Transient errors at the batch level abort the remaining events in the
/// batch and surface as [`IngestError::Backpressure`] or
/// [`IngestError::Unavailable`] (§4.5: "no partial batch is persisted" on
/// database unavailability). Permanent errors are reported per-event in
/// `failed[]` and do not stop the batch.
#[must_use]
pub fn is_transient(err: &sqlx::Error) -> bool {
    transient_kind(err).is_some()
}

/// Classify a transient storage error into the specific retryable
/// `IngestError` it should surface as, or `None` if it's permanent.
#[must_use]
pub fn transient_kind(err: &sqlx::Error) -> Option<IngestError> {
    match err {
        sqlx::Error::PoolTimedOut => Some(IngestError::Backpressure),
        sqlx::Error::PoolClosed | sqlx::Error::Io(_) => Some(IngestError::Unavailable),
        sqlx::Error::Database(db_err) => matches!(
            db_err.code().as_deref(),
            Some("40001") | Some("40P01") // serialization_failure, deadlock_detected
        )
        .then_some(IngestError::Unavailable),
        _ => None,
    }
}
