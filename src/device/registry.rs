//! Device token registry abstraction.
//!
//! Per `(user, token)` lifecycle:
//!
//! ```text
//! (none) --register--> ACTIVE --deactivate/terminal push error--> INACTIVE --sweep--> (deleted)
//!                        ^                                            |
//!                        +-------------------register-----------------+
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::storage::StoreError;

use super::types::{DeviceToken, TokenRegistration};

#[async_trait]
pub trait DeviceTokenRegistry: Send + Sync {
    /// Upsert a token for a user. An existing row keeps its id, takes the new
    /// metadata, becomes active and has `last_used_at` refreshed.
    async fn register(&self, registration: TokenRegistration) -> Result<DeviceToken, StoreError>;

    /// Deactivate one token. Returns whether an active row was changed.
    async fn deactivate(&self, user_id: &str, token: &str) -> Result<bool, StoreError>;

    /// Deactivate every token of a user. Returns the number of rows changed.
    async fn deactivate_all(&self, user_id: &str) -> Result<u64, StoreError>;

    /// Active token strings for a user. Never includes inactive rows.
    async fn list_active(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    async fn count_active(&self, user_id: &str) -> Result<u64, StoreError>;

    /// Refresh `last_used_at` after a successful push.
    async fn mark_used(&self, user_id: &str, token: &str) -> Result<(), StoreError>;

    /// Delete inactive rows last updated before `cutoff`. Returns rows deleted.
    async fn sweep(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    fn backend_type(&self) -> &'static str;
}
