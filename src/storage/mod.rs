//! Storage wiring for notifications, device tokens and settings.
//!
//! Each store is a trait with an in-memory and a PostgreSQL implementation.
//! `create_stores()` selects the backend from `storage.backend`:
//!
//! - `"memory"` (default): DashMap-backed, lost on restart
//! - `"postgres"`: sqlx pool with embedded migrations

mod error;
pub mod pool;

use std::sync::Arc;

pub use error::StoreError;
pub use pool::{PostgresPool, PostgresPoolError};

use crate::config::StorageConfig;
use crate::device::{DeviceTokenRegistry, MemoryDeviceTokenRegistry, PostgresDeviceTokenRegistry};
use crate::notification::{MemoryNotificationStore, NotificationStore, PostgresNotificationStore};
use crate::preferences::{MemorySettingsStore, PostgresSettingsStore, SettingsStore};

/// The three stores the service runs on
#[derive(Clone)]
pub struct Stores {
    pub notifications: Arc<dyn NotificationStore>,
    pub tokens: Arc<dyn DeviceTokenRegistry>,
    pub settings: Arc<dyn SettingsStore>,
    pub pool: Option<PostgresPool>,
}

impl Stores {
    /// In-memory stores
    pub fn memory() -> Self {
        Self {
            notifications: Arc::new(MemoryNotificationStore::new()),
            tokens: Arc::new(MemoryDeviceTokenRegistry::new()),
            settings: Arc::new(MemorySettingsStore::new()),
            pool: None,
        }
    }

    /// PostgreSQL-backed stores sharing one pool
    pub fn postgres(pool: PostgresPool) -> Self {
        let pg = pool.pool().clone();
        Self {
            notifications: Arc::new(PostgresNotificationStore::new(pg.clone())),
            tokens: Arc::new(PostgresDeviceTokenRegistry::new(pg.clone())),
            settings: Arc::new(PostgresSettingsStore::new(pg)),
            pool: Some(pool),
        }
    }
}

/// Build the stores named by configuration.
pub async fn create_stores(config: &StorageConfig) -> Result<Stores, PostgresPoolError> {
    match config.backend.as_str() {
        "postgres" => {
            tracing::info!(backend = "postgres", "Creating PostgreSQL stores");
            let pool = PostgresPool::new(config).await?;
            Ok(Stores::postgres(pool))
        }
        "memory" => {
            tracing::info!(backend = "memory", "Creating in-memory stores");
            Ok(Stores::memory())
        }
        other => {
            tracing::warn!(backend = %other, "Unknown storage backend, falling back to memory");
            Ok(Stores::memory())
        }
    }
}
