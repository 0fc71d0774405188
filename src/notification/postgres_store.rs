//! PostgreSQL notification store.
//!
//! Table: `notifications` (see `migrations/`). A CHECK constraint keeps
//! `read_at` non-null exactly when `is_read` is true.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::storage::StoreError;

use super::store::NotificationStore;
use super::types::{NewNotification, Notification, NotificationId, NotificationType, Page, PageRequest};

type NotificationRow = (
    i64,
    String,
    String,
    String,
    String,
    bool,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<String>,
);

const COLUMNS: &str =
    "id, user_id, type, title, message, is_read, created_at, read_at, action_url";

fn from_row(row: NotificationRow) -> Result<Notification, StoreError> {
    let (id, user_id, kind, title, message, is_read, created_at, read_at, action_url) = row;
    let notification_type = NotificationType::parse(&kind)
        .ok_or_else(|| StoreError::Corrupt(format!("notification {} has unknown type {}", id, kind)))?;

    Ok(Notification {
        id,
        user_id,
        notification_type,
        title,
        message,
        is_read,
        created_at,
        read_at,
        action_url,
    })
}

pub struct PostgresNotificationStore {
    pool: PgPool,
}

impl PostgresNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PostgresNotificationStore {
    async fn insert(&self, new: NewNotification) -> Result<Notification, StoreError> {
        new.validate()?;

        let row: NotificationRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO notifications (user_id, type, title, message, action_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(&new.user_id)
        .bind(new.notification_type.as_str())
        .bind(&new.title)
        .bind(&new.message)
        .bind(&new.action_url)
        .fetch_one(&self.pool)
        .await?;

        from_row(row)
    }

    async fn find(&self, user_id: &str, id: NotificationId) -> Result<Option<Notification>, StoreError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM notifications WHERE user_id = $1 AND id = $2",
            COLUMNS
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(from_row).transpose()
    }

    async fn list(&self, user_id: &str, page: PageRequest) -> Result<Page<Notification>, StoreError> {
        let page = page.clamped();

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            COLUMNS
        ))
        .bind(user_id)
        .bind(page.size as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let content = rows.into_iter().map(from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(content, page, total.max(0) as u64))
    }

    async fn list_unread(&self, user_id: &str) -> Result<Vec<Notification>, StoreError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM notifications
            WHERE user_id = $1 AND is_read = FALSE
            ORDER BY created_at DESC, id DESC
            "#,
            COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(from_row).collect()
    }

    async fn unread_count(&self, user_id: &str) -> Result<u64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count.max(0) as u64)
    }

    async fn mark_as_read(&self, user_id: &str, id: NotificationId) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = NOW()
            WHERE user_id = $1 AND id = $2 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_all_as_read(&self, user_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = NOW()
            WHERE user_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            user_id = %user_id,
            updated = result.rows_affected(),
            "Marked all notifications as read"
        );

        Ok(result.rows_affected())
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}
