//! Authentication middleware for the ingest gateway.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use super::error::AuthError;
use super::jwt::validate_token;
use crate::ingest::AppState;

/// The authenticated principal for an ingest request, injected into request
/// extensions by [`require_auth`].
///
/// Unlike the teacher's `AuthUser`, this does not round-trip to the
/// database: the ingest gateway's principal is a probe/service token, not a
/// user session, so the validated `sub` claim is all a handler needs.
#[derive(Debug, Clone)]
pub struct AuthPrincipal {
    pub subject: String,
}

/// Require a valid bearer token, injecting `AuthPrincipal` into request
/// extensions on success.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?;

    let claims = validate_token(token, &state.config.jwt_public_key)?;

    request
        .extensions_mut()
        .insert(AuthPrincipal { subject: claims.sub });

    Ok(next.run(request).await)
}

impl<S> axum::extract::FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}
