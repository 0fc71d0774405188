//! Per-user notification preferences.

mod memory_store;
mod postgres_store;
mod store;
mod types;

pub use memory_store::MemorySettingsStore;
pub use postgres_store::PostgresSettingsStore;
pub use store::SettingsStore;
pub use types::{default_reminder_time, NotificationSettings, SettingsUpdate};
