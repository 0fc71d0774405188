//! Producer entry points for out-of-process jobs, guarded by `X-API-Key`.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::notification::{NewNotification, NotificationId, NotificationType};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: NotificationId,
}

/// POST /internal/notifications
///
/// Returns once the row is durable; delivery happens afterwards.
#[tracing::instrument(name = "http.internal_create", skip(state, request), fields(user_id = %request.user_id))]
pub async fn create_notification(
    State(state): State<AppState>,
    Json(request): Json<NewNotification>,
) -> Result<Json<CreatedResponse>> {
    let id = state.dispatcher.create(request).await?;
    Ok(Json(CreatedResponse { id }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerRequest {
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Body text for analysis, insight and achievement notifications
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProducerResponse {
    /// `None` when the user's settings suppress this type
    pub id: Option<NotificationId>,
    pub suppressed: bool,
}

/// POST /internal/notifications/producer
///
/// Canonical notification for a scheduled job, subject to the user's settings.
#[tracing::instrument(name = "http.internal_produce", skip(state, request), fields(user_id = %request.user_id))]
pub async fn produce_notification(
    State(state): State<AppState>,
    Json(request): Json<ProducerRequest>,
) -> Result<Json<ProducerResponse>> {
    let dispatcher = &state.dispatcher;
    let user_id = request.user_id.as_str();
    let text = || {
        request
            .text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::Validation("text is required for this type".into()))
    };

    let id = match request.notification_type {
        NotificationType::DiaryReminder => dispatcher.diary_reminder(user_id).await?,
        NotificationType::MoodAnalysis => dispatcher.mood_analysis(user_id, text()?).await?,
        NotificationType::FinancialInsight => dispatcher.financial_insight(user_id, text()?).await?,
        NotificationType::Achievement => dispatcher.achievement(user_id, text()?).await?,
        NotificationType::System => {
            return Err(AppError::Validation(
                "SYSTEM notifications are created via /internal/notifications".into(),
            ))
        }
    };

    Ok(Json(ProducerResponse {
        id,
        suppressed: id.is_none(),
    }))
}
