//! PostgreSQL settings store.
//!
//! Table: `notification_settings`, one row per user. Both the lazy default
//! insert and the partial update are single upsert statements.

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::PgPool;

use crate::storage::StoreError;

use super::store::SettingsStore;
use super::types::{default_reminder_time, NotificationSettings, SettingsUpdate};

type SettingsRow = (
    String,
    bool,
    Option<NaiveTime>,
    bool,
    bool,
    bool,
    bool,
    bool,
    DateTime<Utc>,
);

const COLUMNS: &str = "user_id, diary_reminder_enabled, diary_reminder_time, mood_analysis_enabled, \
     financial_insights_enabled, achievement_notifications_enabled, push_notifications_enabled, \
     email_notifications_enabled, updated_at";

fn from_row(row: SettingsRow) -> NotificationSettings {
    let (user_id, diary, time, mood, financial, achievement, push, email, updated_at) = row;
    NotificationSettings {
        user_id,
        diary_reminder_enabled: diary,
        diary_reminder_time: time.unwrap_or_else(default_reminder_time),
        mood_analysis_enabled: mood,
        financial_insights_enabled: financial,
        achievement_notifications_enabled: achievement,
        push_notifications_enabled: push,
        email_notifications_enabled: email,
        updated_at,
    }
}

pub struct PostgresSettingsStore {
    pool: PgPool,
}

impl PostgresSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PostgresSettingsStore {
    async fn get_or_create(&self, user_id: &str) -> Result<NotificationSettings, StoreError> {
        sqlx::query("INSERT INTO notification_settings (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        self.find(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("settings for user {}", user_id)))
    }

    async fn find(&self, user_id: &str) -> Result<Option<NotificationSettings>, StoreError> {
        let row: Option<SettingsRow> = sqlx::query_as(&format!(
            "SELECT {} FROM notification_settings WHERE user_id = $1",
            COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    async fn update(&self, user_id: &str, update: SettingsUpdate) -> Result<NotificationSettings, StoreError> {
        let row: SettingsRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO notification_settings AS s (
                user_id, diary_reminder_enabled, diary_reminder_time, mood_analysis_enabled,
                financial_insights_enabled, achievement_notifications_enabled,
                push_notifications_enabled, email_notifications_enabled
            )
            VALUES (
                $1,
                COALESCE($2, TRUE),
                COALESCE($3, TIME '20:00'),
                COALESCE($4, TRUE),
                COALESCE($5, TRUE),
                COALESCE($6, TRUE),
                COALESCE($7, TRUE),
                COALESCE($8, FALSE)
            )
            ON CONFLICT (user_id) DO UPDATE SET
                diary_reminder_enabled = COALESCE($2, s.diary_reminder_enabled),
                diary_reminder_time = COALESCE($3, s.diary_reminder_time),
                mood_analysis_enabled = COALESCE($4, s.mood_analysis_enabled),
                financial_insights_enabled = COALESCE($5, s.financial_insights_enabled),
                achievement_notifications_enabled = COALESCE($6, s.achievement_notifications_enabled),
                push_notifications_enabled = COALESCE($7, s.push_notifications_enabled),
                email_notifications_enabled = COALESCE($8, s.email_notifications_enabled),
                updated_at = NOW()
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(user_id)
        .bind(update.diary_reminder_enabled)
        .bind(update.diary_reminder_time)
        .bind(update.mood_analysis_enabled)
        .bind(update.financial_insights_enabled)
        .bind(update.achievement_notifications_enabled)
        .bind(update.push_notifications_enabled)
        .bind(update.email_notifications_enabled)
        .fetch_one(&self.pool)
        .await?;

        Ok(from_row(row))
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}
