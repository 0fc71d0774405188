use async_trait::async_trait;
use dashmap::DashMap;

use crate::storage::StoreError;

use super::store::SettingsStore;
use super::types::{NotificationSettings, SettingsUpdate};

/// In-memory settings keyed by user id
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: DashMap<String, NotificationSettings>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get_or_create(&self, user_id: &str) -> Result<NotificationSettings, StoreError> {
        Ok(self
            .settings
            .entry(user_id.to_string())
            .or_insert_with(|| NotificationSettings::defaults_for(user_id))
            .clone())
    }

    async fn find(&self, user_id: &str) -> Result<Option<NotificationSettings>, StoreError> {
        Ok(self.settings.get(user_id).map(|s| s.clone()))
    }

    async fn update(&self, user_id: &str, update: SettingsUpdate) -> Result<NotificationSettings, StoreError> {
        let mut entry = self
            .settings
            .entry(user_id.to_string())
            .or_insert_with(|| NotificationSettings::defaults_for(user_id));
        entry.apply(&update);
        Ok(entry.clone())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_inserts_defaults_once() {
        let store = MemorySettingsStore::new();
        assert!(store.find("u1").await.unwrap().is_none());

        let created = store.get_or_create("u1").await.unwrap();
        assert!(created.push_notifications_enabled);

        let again = store.get_or_create("u1").await.unwrap();
        assert_eq!(created, again);
        assert!(store.find("u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_merges() {
        let store = MemorySettingsStore::new();
        let updated = store
            .update(
                "u1",
                SettingsUpdate {
                    push_notifications_enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(!updated.push_notifications_enabled);
        assert!(updated.diary_reminder_enabled);
        assert_eq!(store.find("u1").await.unwrap().unwrap(), updated);
    }
}
