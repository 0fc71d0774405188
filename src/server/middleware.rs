use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

use crate::error::AppError;

use super::AppState;

/// Header carrying the shared secret of out-of-process producers
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Guards `/internal/*`, where batch jobs create notifications on behalf of
/// any user. End users never hold this key; they go through `AuthUser`.
///
/// With no `api.key` configured every producer call is let through, which
/// is only meant for local development.
pub async fn api_key_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected_key) = &state.settings.api.key else {
        return Ok(next.run(req).await);
    };

    match req.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        Some(key) if key == expected_key => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!(path = %req.uri().path(), "Producer call rejected: wrong API key");
            Err(AppError::Auth("Invalid producer API key".into()))
        }
        None => {
            tracing::warn!(path = %req.uri().path(), "Producer call rejected: no API key");
            Err(AppError::Auth("Missing producer API key".into()))
        }
    }
}
