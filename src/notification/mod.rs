//! Notification records and their fan-out.
//!
//! # Store Architecture
//!
//! `NotificationStore` has two implementations:
//!
//! - `MemoryNotificationStore`: DashMap-backed (default, used by tests)
//! - `PostgresNotificationStore`: `notifications` table via sqlx
//!
//! `FanoutDispatcher` writes through the store and then queues a delivery
//! job; `Deliverer` runs that job on the worker pool.

mod delivery;
mod dispatcher;
mod memory_store;
mod postgres_store;
mod producers;
mod store;
mod types;
mod worker;

pub use delivery::Deliverer;
pub use dispatcher::{DispatchError, DispatcherStats, DispatcherStatsSnapshot, FanoutDispatcher};
pub use memory_store::MemoryNotificationStore;
pub use postgres_store::PostgresNotificationStore;
pub use store::NotificationStore;
pub use types::{
    DisplayMeta, NewNotification, Notification, NotificationId, NotificationPayload,
    NotificationType, Page, PageRequest, MAX_ACTION_URL_LEN, MAX_MESSAGE_LEN, MAX_PAGE_SIZE,
    MAX_TITLE_LEN,
};
pub use worker::{DeliveryJob, DeliveryPool, SubmitError};
