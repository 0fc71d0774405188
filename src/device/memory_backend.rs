//! In-memory device token registry using DashMap.
//!
//! Tokens are kept per user in registration order. Data is lost on restart.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::storage::StoreError;

use super::registry::DeviceTokenRegistry;
use super::types::{DeviceToken, TokenRegistration};

pub struct MemoryDeviceTokenRegistry {
    tokens: DashMap<String, Vec<DeviceToken>>,
    next_id: AtomicI64,
}

impl MemoryDeviceTokenRegistry {
    pub fn new() -> Self {
        Self {
            tokens: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryDeviceTokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceTokenRegistry for MemoryDeviceTokenRegistry {
    async fn register(&self, registration: TokenRegistration) -> Result<DeviceToken, StoreError> {
        registration.validate()?;

        let now = Utc::now();
        let mut rows = self.tokens.entry(registration.user_id.clone()).or_default();

        if let Some(existing) = rows.iter_mut().find(|t| t.token == registration.token) {
            existing.device_type = registration.device_type;
            existing.browser_info = registration.browser_info;
            existing.is_active = true;
            existing.last_used_at = now;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let token = DeviceToken {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            user_id: registration.user_id,
            token: registration.token,
            device_type: registration.device_type,
            browser_info: registration.browser_info,
            is_active: true,
            last_used_at: now,
            created_at: now,
            updated_at: now,
        };
        rows.push(token.clone());

        Ok(token)
    }

    async fn deactivate(&self, user_id: &str, token: &str) -> Result<bool, StoreError> {
        let Some(mut rows) = self.tokens.get_mut(user_id) else {
            return Ok(false);
        };

        match rows.iter_mut().find(|t| t.token == token && t.is_active) {
            Some(row) => {
                row.is_active = false;
                row.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn deactivate_all(&self, user_id: &str) -> Result<u64, StoreError> {
        let Some(mut rows) = self.tokens.get_mut(user_id) else {
            return Ok(0);
        };

        let now = Utc::now();
        let mut changed = 0;
        for row in rows.iter_mut().filter(|t| t.is_active) {
            row.is_active = false;
            row.updated_at = now;
            changed += 1;
        }
        Ok(changed)
    }

    async fn list_active(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .tokens
            .get(user_id)
            .map(|rows| {
                rows.iter()
                    .filter(|t| t.is_active)
                    .map(|t| t.token.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count_active(&self, user_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .tokens
            .get(user_id)
            .map(|rows| rows.iter().filter(|t| t.is_active).count() as u64)
            .unwrap_or(0))
    }

    async fn mark_used(&self, user_id: &str, token: &str) -> Result<(), StoreError> {
        if let Some(mut rows) = self.tokens.get_mut(user_id) {
            if let Some(row) = rows.iter_mut().find(|t| t.token == token) {
                row.last_used_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn sweep(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut removed = 0u64;

        // Collect user IDs first to avoid holding shard locks across users
        let user_ids: Vec<String> = self.tokens.iter().map(|r| r.key().clone()).collect();

        for user_id in user_ids {
            if let Some(mut rows) = self.tokens.get_mut(&user_id) {
                let before = rows.len();
                rows.retain(|t| t.is_active || t.updated_at >= cutoff);
                removed += (before - rows.len()) as u64;

                if rows.is_empty() {
                    drop(rows);
                    self.tokens.remove_if(&user_id, |_, rows| rows.is_empty());
                }
            }
        }

        Ok(removed)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceType;
    use chrono::Duration;

    fn reg(user: &str, token: &str, device_type: DeviceType) -> TokenRegistration {
        TokenRegistration::new(user, token, device_type)
    }

    #[tokio::test]
    async fn test_register_is_upsert() {
        let registry = MemoryDeviceTokenRegistry::new();

        let first = registry.register(reg("u1", "T1", DeviceType::Web)).await.unwrap();
        let second = registry
            .register(reg("u1", "T1", DeviceType::Ios).with_browser_info(Some("Safari".into())))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.device_type, DeviceType::Ios);
        assert_eq!(second.browser_info.as_deref(), Some("Safari"));
        assert!(second.last_used_at >= first.last_used_at);
        assert_eq!(registry.tokens.get("u1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_token_different_users_are_distinct() {
        let registry = MemoryDeviceTokenRegistry::new();
        registry.register(reg("u1", "T", DeviceType::Web)).await.unwrap();
        registry.register(reg("u2", "T", DeviceType::Web)).await.unwrap();

        registry.deactivate("u1", "T").await.unwrap();
        assert!(registry.list_active("u1").await.unwrap().is_empty());
        assert_eq!(registry.list_active("u2").await.unwrap(), vec!["T".to_string()]);
    }

    #[tokio::test]
    async fn test_deactivate_then_reregister_reactivates() {
        let registry = MemoryDeviceTokenRegistry::new();
        registry.register(reg("u1", "T1", DeviceType::Web)).await.unwrap();

        assert!(registry.deactivate("u1", "T1").await.unwrap());
        assert!(!registry.deactivate("u1", "T1").await.unwrap());
        assert_eq!(registry.count_active("u1").await.unwrap(), 0);

        let row = registry.register(reg("u1", "T1", DeviceType::Web)).await.unwrap();
        assert!(row.is_active);
        assert_eq!(registry.list_active("u1").await.unwrap(), vec!["T1".to_string()]);
    }

    #[tokio::test]
    async fn test_deactivate_all() {
        let registry = MemoryDeviceTokenRegistry::new();
        registry.register(reg("u1", "A", DeviceType::Web)).await.unwrap();
        registry.register(reg("u1", "B", DeviceType::Android)).await.unwrap();

        assert_eq!(registry.deactivate_all("u1").await.unwrap(), 2);
        assert!(registry.list_active("u1").await.unwrap().is_empty());
        assert_eq!(registry.deactivate_all("nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_stale_inactive() {
        let registry = MemoryDeviceTokenRegistry::new();
        registry.register(reg("u1", "live", DeviceType::Web)).await.unwrap();
        registry.register(reg("u1", "dead", DeviceType::Web)).await.unwrap();
        registry.deactivate("u1", "dead").await.unwrap();

        // Nothing is older than a cutoff in the past
        let removed = registry.sweep(Utc::now() - Duration::days(30)).await.unwrap();
        assert_eq!(removed, 0);

        let removed = registry.sweep(Utc::now() + Duration::seconds(1)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(registry.list_active("u1").await.unwrap(), vec!["live".to_string()]);
        assert_eq!(registry.tokens.get("u1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_empty_token() {
        let registry = MemoryDeviceTokenRegistry::new();
        let err = registry.register(reg("u1", "", DeviceType::Web)).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
