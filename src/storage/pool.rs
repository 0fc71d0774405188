//! PostgreSQL connection pool and schema migrations.

use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;

use crate::config::StorageConfig;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur with the PostgreSQL pool.
#[derive(Debug, Error)]
pub enum PostgresPoolError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Database URL is not configured")]
    MissingUrl,
}

/// PostgreSQL connection pool shared by the store backends.
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
    database_url: String,
}

impl PostgresPool {
    /// Create a new PostgreSQL pool from configuration.
    pub async fn new(config: &StorageConfig) -> Result<Self, PostgresPoolError> {
        if config.url.is_empty() {
            return Err(PostgresPoolError::MissingUrl);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds as u64))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds as u64))
            .connect(&config.url)
            .await?;

        let this = Self {
            pool,
            database_url: config.url.clone(),
        };

        tracing::info!(
            pool_size = config.pool_size,
            url = %this.database_url_masked(),
            "PostgreSQL connection pool created"
        );

        if config.run_migrations {
            this.migrate().await?;
        }

        Ok(this)
    }

    /// Apply embedded migrations.
    pub async fn migrate(&self) -> Result<(), PostgresPoolError> {
        MIGRATOR.run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the database URL (masked for logging).
    pub fn database_url_masked(&self) -> String {
        mask_url(&self.database_url)
    }

    /// Close the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL connection pool closed");
    }
}

fn mask_url(url: &str) -> String {
    let creds_start = url.find("://").map(|i| i + 3).unwrap_or(0);
    if let Some(at_pos) = url[creds_start..].find('@').map(|i| i + creds_start) {
        if let Some(colon_pos) = url[creds_start..at_pos].rfind(':').map(|i| i + creds_start) {
            return format!("{}***{}", &url[..colon_pos + 1], &url[at_pos..]);
        }
    }
    url.to_string()
}
