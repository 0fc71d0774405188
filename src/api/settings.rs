//! Notification preference endpoints.

use axum::{extract::State, Json};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::preferences::{NotificationSettings, SettingsUpdate};
use crate::server::AppState;

/// GET /api/notifications/settings - creates the defaults on first read
pub async fn get_settings(State(state): State<AppState>, user: AuthUser) -> Result<Json<NotificationSettings>> {
    let settings = state.stores.settings.get_or_create(&user.user_id).await?;
    Ok(Json(settings))
}

/// PUT /api/notifications/settings - absent fields keep their value
#[tracing::instrument(name = "http.update_settings", skip(state, user, update), fields(user_id = %user.user_id))]
pub async fn update_settings(
    State(state): State<AppState>,
    user: AuthUser,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<NotificationSettings>> {
    let settings = state.stores.settings.update(&user.user_id, update).await?;
    tracing::info!("Notification settings updated");
    Ok(Json(settings))
}
