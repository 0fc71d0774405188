//! Storage abstraction for notification records.
//!
//! Every query is scoped by user id. Read-state updates are conditional on
//! the row still being unread, so repeating them changes nothing.

use async_trait::async_trait;

use crate::storage::StoreError;

use super::types::{NewNotification, Notification, NotificationId, Page, PageRequest};

/// Durable notification records with read-state and pagination.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a new unread notification and return the stored row.
    async fn insert(&self, new: NewNotification) -> Result<Notification, StoreError>;

    /// Fetch one notification owned by `user_id`.
    async fn find(&self, user_id: &str, id: NotificationId) -> Result<Option<Notification>, StoreError>;

    /// Page through a user's notifications, newest first.
    async fn list(&self, user_id: &str, page: PageRequest) -> Result<Page<Notification>, StoreError>;

    /// All unread notifications for a user, newest first.
    async fn list_unread(&self, user_id: &str) -> Result<Vec<Notification>, StoreError>;

    async fn unread_count(&self, user_id: &str) -> Result<u64, StoreError>;

    /// Mark one unread notification as read. Returns the number of rows changed (0 or 1).
    async fn mark_as_read(&self, user_id: &str, id: NotificationId) -> Result<u64, StoreError>;

    /// Mark every unread notification of `user_id` as read. Returns the number of rows changed.
    async fn mark_all_as_read(&self, user_id: &str) -> Result<u64, StoreError>;

    /// Backend identifier for stats output
    fn backend_type(&self) -> &'static str;
}
