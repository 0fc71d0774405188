//! In-memory notification store using DashMap.
//!
//! Rows live in a per-user `Vec` kept in insertion order, which is also
//! id order. Data is lost on restart.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::storage::StoreError;

use super::store::NotificationStore;
use super::types::{NewNotification, Notification, NotificationId, Page, PageRequest};

pub struct MemoryNotificationStore {
    rows: DashMap<String, Vec<Notification>>,
    next_id: AtomicI64,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryNotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, new: NewNotification) -> Result<Notification, StoreError> {
        new.validate()?;

        let notification = Notification {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            user_id: new.user_id,
            notification_type: new.notification_type,
            title: new.title,
            message: new.message,
            is_read: false,
            created_at: Utc::now(),
            read_at: None,
            action_url: new.action_url,
        };

        self.rows
            .entry(notification.user_id.clone())
            .or_default()
            .push(notification.clone());

        Ok(notification)
    }

    async fn find(&self, user_id: &str, id: NotificationId) -> Result<Option<Notification>, StoreError> {
        Ok(self
            .rows
            .get(user_id)
            .and_then(|rows| rows.iter().find(|n| n.id == id).cloned()))
    }

    async fn list(&self, user_id: &str, page: PageRequest) -> Result<Page<Notification>, StoreError> {
        let page = page.clamped();
        let Some(rows) = self.rows.get(user_id) else {
            return Ok(Page::new(Vec::new(), page, 0));
        };

        let total = rows.len() as u64;
        let content = rows
            .iter()
            .rev()
            .skip(page.offset() as usize)
            .take(page.size as usize)
            .cloned()
            .collect();

        Ok(Page::new(content, page, total))
    }

    async fn list_unread(&self, user_id: &str) -> Result<Vec<Notification>, StoreError> {
        Ok(self
            .rows
            .get(user_id)
            .map(|rows| rows.iter().rev().filter(|n| !n.is_read).cloned().collect())
            .unwrap_or_default())
    }

    async fn unread_count(&self, user_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .rows
            .get(user_id)
            .map(|rows| rows.iter().filter(|n| !n.is_read).count() as u64)
            .unwrap_or(0))
    }

    async fn mark_as_read(&self, user_id: &str, id: NotificationId) -> Result<u64, StoreError> {
        let Some(mut rows) = self.rows.get_mut(user_id) else {
            return Ok(0);
        };

        match rows.iter_mut().find(|n| n.id == id && !n.is_read) {
            Some(n) => {
                n.is_read = true;
                n.read_at = Some(Utc::now());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn mark_all_as_read(&self, user_id: &str) -> Result<u64, StoreError> {
        let Some(mut rows) = self.rows.get_mut(user_id) else {
            return Ok(0);
        };

        let now = Utc::now();
        let mut updated = 0;
        for n in rows.iter_mut().filter(|n| !n.is_read) {
            n.is_read = true;
            n.read_at = Some(now);
            updated += 1;
        }
        Ok(updated)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
