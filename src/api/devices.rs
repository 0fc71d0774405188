//! Push device token endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::device::{DeviceToken, DeviceType, TokenRegistration};
use crate::error::{AppError, Result};
use crate::metrics::PushMetrics;
use crate::push::{test_payload, PushOutcome};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub browser_info: Option<String>,
}

impl TokenRequest {
    fn token(&self) -> Result<&str> {
        match self.token.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => Ok(t),
            _ => Err(AppError::Validation("token is required".into())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeactivatedResponse {
    pub deactivated: u64,
}

#[derive(Debug, Serialize)]
pub struct TestPushResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// POST /api/notifications/fcm/register
#[tracing::instrument(name = "http.register_token", skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn register_token(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<TokenRequest>,
) -> Result<Json<DeviceToken>> {
    let token = request.token()?;
    let device_type = DeviceType::parse(request.device_type.as_deref())?;
    let registration = TokenRegistration::new(&user.user_id, token, device_type)
        .with_browser_info(request.browser_info.clone());

    let registered = state.stores.tokens.register(registration).await?;
    tracing::info!(device_type = %registered.device_type, "Device token registered");
    Ok(Json(registered))
}

/// POST /api/notifications/fcm/unregister
#[tracing::instrument(name = "http.unregister_token", skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn unregister_token(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<TokenRequest>,
) -> Result<StatusCode> {
    let token = request.token()?;
    let changed = state.stores.tokens.deactivate(&user.user_id, token).await?;
    tracing::info!(changed, "Device token unregistered");
    Ok(StatusCode::OK)
}

/// POST /api/notifications/fcm/unregister-all - used on logout
#[tracing::instrument(name = "http.unregister_all_tokens", skip(state, user), fields(user_id = %user.user_id))]
pub async fn unregister_all_tokens(State(state): State<AppState>, user: AuthUser) -> Result<Json<DeactivatedResponse>> {
    let deactivated = state.stores.tokens.deactivate_all(&user.user_id).await?;
    tracing::info!(deactivated, "All device tokens unregistered");
    Ok(Json(DeactivatedResponse { deactivated }))
}

/// POST /api/notifications/fcm/test - push a fixed payload to one token
///
/// A terminal outcome deactivates the token just like regular delivery.
#[tracing::instrument(name = "http.test_push", skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn send_test_push(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TestPushResponse>> {
    let token = request.token()?.to_string();
    let outcomes = state
        .push
        .send_to_tokens(std::slice::from_ref(&token), &test_payload())
        .await;
    let outcome = outcomes
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("push gateway returned no outcome".into()))?;

    PushMetrics::record_outcome(&outcome);

    let detail = match &outcome {
        PushOutcome::Success => {
            state.stores.tokens.mark_used(&user.user_id, &token).await?;
            None
        }
        PushOutcome::Transient(reason) => Some(reason.clone()),
        PushOutcome::Terminal(reason) => {
            tracing::warn!(reason = %reason, "Test push hit an invalid token, deactivating");
            if state.stores.tokens.deactivate(&user.user_id, &token).await? {
                PushMetrics::record_deactivated();
            }
            Some(reason.clone())
        }
    };

    Ok(Json(TestPushResponse {
        outcome: outcome.label(),
        detail,
    }))
}
