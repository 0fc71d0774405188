//! PostgreSQL device token registry.
//!
//! Table: `device_tokens` with `UNIQUE (user_id, token)`. Registration is a
//! single `INSERT ... ON CONFLICT DO UPDATE`, so concurrent registers of the
//! same token never produce a second row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::storage::StoreError;

use super::registry::DeviceTokenRegistry;
use super::types::{DeviceToken, DeviceType, TokenRegistration};

type DeviceTokenRow = (
    i64,
    String,
    String,
    String,
    Option<String>,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn from_row(row: DeviceTokenRow) -> Result<DeviceToken, StoreError> {
    let (id, user_id, token, device_type, browser_info, is_active, last_used_at, created_at, updated_at) = row;
    let device_type = DeviceType::parse(Some(&device_type))
        .map_err(|_| StoreError::Corrupt(format!("device token {} has type {}", id, device_type)))?;

    Ok(DeviceToken {
        id,
        user_id,
        token,
        device_type,
        browser_info,
        is_active,
        last_used_at,
        created_at,
        updated_at,
    })
}

pub struct PostgresDeviceTokenRegistry {
    pool: PgPool,
}

impl PostgresDeviceTokenRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceTokenRegistry for PostgresDeviceTokenRegistry {
    async fn register(&self, registration: TokenRegistration) -> Result<DeviceToken, StoreError> {
        registration.validate()?;

        let row: DeviceTokenRow = sqlx::query_as(
            r#"
            INSERT INTO device_tokens (user_id, token, device_type, browser_info)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, token) DO UPDATE
            SET device_type = EXCLUDED.device_type,
                browser_info = EXCLUDED.browser_info,
                is_active = TRUE,
                last_used_at = NOW(),
                updated_at = NOW()
            RETURNING id, user_id, token, device_type, browser_info, is_active,
                      last_used_at, created_at, updated_at
            "#,
        )
        .bind(&registration.user_id)
        .bind(&registration.token)
        .bind(registration.device_type.as_str())
        .bind(&registration.browser_info)
        .fetch_one(&self.pool)
        .await?;

        from_row(row)
    }

    async fn deactivate(&self, user_id: &str, token: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE device_tokens
            SET is_active = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND token = $2 AND is_active = TRUE
            "#,
        )
        .bind(user_id)
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn deactivate_all(&self, user_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE device_tokens
            SET is_active = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_active(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT token FROM device_tokens WHERE user_id = $1 AND is_active = TRUE ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(token,)| token).collect())
    }

    async fn count_active(&self, user_id: &str) -> Result<u64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM device_tokens WHERE user_id = $1 AND is_active = TRUE")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count.max(0) as u64)
    }

    async fn mark_used(&self, user_id: &str, token: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE device_tokens SET last_used_at = NOW() WHERE user_id = $1 AND token = $2")
            .bind(user_id)
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn sweep(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM device_tokens WHERE is_active = FALSE AND updated_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}
