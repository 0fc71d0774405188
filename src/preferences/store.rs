use async_trait::async_trait;

use crate::storage::StoreError;

use super::types::{NotificationSettings, SettingsUpdate};

/// Per-user notification settings with get-or-create-default reads.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Return the user's settings, inserting the defaults if no row exists.
    async fn get_or_create(&self, user_id: &str) -> Result<NotificationSettings, StoreError>;

    /// Read without creating. Callers treat `None` as the defaults.
    async fn find(&self, user_id: &str) -> Result<Option<NotificationSettings>, StoreError>;

    /// Merge a partial update into the user's settings and return the result.
    async fn update(&self, user_id: &str, update: SettingsUpdate) -> Result<NotificationSettings, StoreError>;

    fn backend_type(&self) -> &'static str;
}
