//! Canonical notifications raised by the scheduled jobs.
//!
//! Each helper checks the user's settings first and returns `Ok(None)`
//! when the user opted out of that type.

use crate::metrics::NotificationMetrics;
use crate::preferences::NotificationSettings;

use super::dispatcher::{DispatchError, FanoutDispatcher};
use super::types::{NewNotification, NotificationId, NotificationType};

impl FanoutDispatcher {
    /// Daily prompt to write a diary entry
    pub async fn diary_reminder(&self, user_id: &str) -> Result<Option<NotificationId>, DispatchError> {
        self.create_if_allowed(NewNotification::new(
            user_id,
            NotificationType::DiaryReminder,
            "일기 작성 시간입니다",
            "오늘의 감정을 기록해보세요!",
            Some(default_url(NotificationType::DiaryReminder)),
        ))
        .await
    }

    pub async fn mood_analysis(&self, user_id: &str, summary: &str) -> Result<Option<NotificationId>, DispatchError> {
        self.create_if_allowed(NewNotification::new(
            user_id,
            NotificationType::MoodAnalysis,
            "감정 분석 결과",
            summary,
            Some(default_url(NotificationType::MoodAnalysis)),
        ))
        .await
    }

    pub async fn financial_insight(
        &self,
        user_id: &str,
        insight: &str,
    ) -> Result<Option<NotificationId>, DispatchError> {
        self.create_if_allowed(NewNotification::new(
            user_id,
            NotificationType::FinancialInsight,
            "금융 인사이트",
            insight,
            Some(default_url(NotificationType::FinancialInsight)),
        ))
        .await
    }

    pub async fn achievement(&self, user_id: &str, achievement: &str) -> Result<Option<NotificationId>, DispatchError> {
        self.create_if_allowed(NewNotification::new(
            user_id,
            NotificationType::Achievement,
            "목표 달성!",
            achievement,
            Some(default_url(NotificationType::Achievement)),
        ))
        .await
    }

    async fn create_if_allowed(&self, new: NewNotification) -> Result<Option<NotificationId>, DispatchError> {
        let settings = self
            .settings_store()
            .find(&new.user_id)
            .await?
            .unwrap_or_else(|| NotificationSettings::defaults_for(new.user_id.as_str()));

        if !settings.allows(new.notification_type) {
            NotificationMetrics::record_suppressed(new.notification_type);
            tracing::debug!(
                user_id = %new.user_id,
                notification_type = %new.notification_type,
                "Notification suppressed by user settings"
            );
            return Ok(None);
        }

        self.create(new).await.map(Some)
    }
}

fn default_url(notification_type: NotificationType) -> String {
    notification_type.display().default_action_url.to_string()
}
