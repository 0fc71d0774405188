//! Notification inbox endpoints for the authenticated caller.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::notification::{Notification, NotificationId, NotificationType, Page, PageRequest};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub updated: u64,
}

/// GET /api/notifications?page=0&size=20
#[tracing::instrument(name = "http.list_notifications", skip(state, user), fields(user_id = %user.user_id))]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Notification>>> {
    let page = state
        .stores
        .notifications
        .list(&user.user_id, page.clamped())
        .await?;
    Ok(Json(page))
}

/// GET /api/notifications/unread
#[tracing::instrument(name = "http.list_unread", skip(state, user), fields(user_id = %user.user_id))]
pub async fn list_unread(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<Notification>>> {
    let unread = state.stores.notifications.list_unread(&user.user_id).await?;
    Ok(Json(unread))
}

/// GET /api/notifications/unread/count
pub async fn unread_count(State(state): State<AppState>, user: AuthUser) -> Result<Json<u64>> {
    let count = state.stores.notifications.unread_count(&user.user_id).await?;
    Ok(Json(count))
}

/// PUT /api/notifications/{id}/read
///
/// Marking an already-read notification succeeds without touching `readAt`.
#[tracing::instrument(name = "http.mark_read", skip(state, user), fields(user_id = %user.user_id))]
pub async fn mark_as_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<NotificationId>,
) -> Result<StatusCode> {
    let store = &state.stores.notifications;
    if store.mark_as_read(&user.user_id, id).await? > 0 {
        return Ok(StatusCode::OK);
    }

    match store.find(&user.user_id, id).await? {
        Some(_) => Ok(StatusCode::OK),
        None => Err(AppError::NotFound(format!("Notification {} not found", id))),
    }
}

/// PUT /api/notifications/read-all
#[tracing::instrument(name = "http.mark_all_read", skip(state, user), fields(user_id = %user.user_id))]
pub async fn mark_all_as_read(State(state): State<AppState>, user: AuthUser) -> Result<Json<UpdatedResponse>> {
    let updated = state.stores.notifications.mark_all_as_read(&user.user_id).await?;
    Ok(Json(UpdatedResponse { updated }))
}

/// POST /api/notifications/test - create a SYSTEM notification for the caller
#[tracing::instrument(name = "http.test_notification", skip(state, user), fields(user_id = %user.user_id))]
pub async fn send_test_notification(State(state): State<AppState>, user: AuthUser) -> Result<StatusCode> {
    state
        .dispatcher
        .create_notification(
            &user.user_id,
            NotificationType::System,
            "테스트 알림",
            "이것은 테스트 알림입니다.",
            None,
        )
        .await?;
    Ok(StatusCode::OK)
}
