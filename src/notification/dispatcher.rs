use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::channel_registry::ChannelRegistry;
use crate::config::DeliveryConfig;
use crate::device::DeviceTokenRegistry;
use crate::metrics::{DeliveryMetrics, NotificationMetrics};
use crate::preferences::SettingsStore;
use crate::push::PushGateway;
use crate::storage::StoreError;

use super::delivery::Deliverer;
use super::store::NotificationStore;
use super::types::{NewNotification, NotificationId, NotificationType};
use super::worker::{DeliveryJob, DeliveryPool, SubmitError};

/// Errors surfaced to the producer by `create()`
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The row was not written; no delivery was attempted
    #[error("Failed to persist notification: {0}")]
    Persistence(#[from] StoreError),
}

/// Statistics for the fan-out dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    pub created: AtomicU64,
    pub persist_failures: AtomicU64,
    pub jobs_submitted: AtomicU64,
    pub jobs_rejected: AtomicU64,
    pub jobs_completed: AtomicU64,
    pub live_delivered: AtomicU64,
    pub live_failed: AtomicU64,
    pub push_success: AtomicU64,
    pub push_transient: AtomicU64,
    pub push_terminal: AtomicU64,
    /// Jobs whose push leg was skipped by user settings
    pub push_skipped: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            jobs_rejected: self.jobs_rejected.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            live_delivered: self.live_delivered.load(Ordering::Relaxed),
            live_failed: self.live_failed.load(Ordering::Relaxed),
            push_success: self.push_success.load(Ordering::Relaxed),
            push_transient: self.push_transient.load(Ordering::Relaxed),
            push_terminal: self.push_terminal.load(Ordering::Relaxed),
            push_skipped: self.push_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub created: u64,
    pub persist_failures: u64,
    pub jobs_submitted: u64,
    pub jobs_rejected: u64,
    pub jobs_completed: u64,
    pub live_delivered: u64,
    pub live_failed: u64,
    pub push_success: u64,
    pub push_transient: u64,
    pub push_terminal: u64,
    pub push_skipped: u64,
}

/// Persists notifications and hands them to the delivery pool.
///
/// `create()` returns once the row is durable. Live and push delivery run
/// on the pool afterwards, so a producer never waits on socket or provider
/// I/O.
pub struct FanoutDispatcher {
    store: Arc<dyn NotificationStore>,
    settings: Arc<dyn SettingsStore>,
    pool: DeliveryPool,
    stats: Arc<DispatcherStats>,
}

impl FanoutDispatcher {
    /// Build the dispatcher and start its worker pool on the current runtime.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        channels: Arc<ChannelRegistry>,
        tokens: Arc<dyn DeviceTokenRegistry>,
        settings: Arc<dyn SettingsStore>,
        push: Arc<dyn PushGateway>,
        config: &DeliveryConfig,
    ) -> Self {
        let stats = Arc::new(DispatcherStats::default());
        let deliverer = Arc::new(Deliverer::new(
            channels,
            tokens,
            settings.clone(),
            push,
            Duration::from_millis(config.live_send_timeout_ms),
            stats.clone(),
        ));
        let pool = DeliveryPool::start(deliverer, config.workers, config.queue_capacity);

        Self {
            store,
            settings,
            pool,
            stats,
        }
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn queued_jobs(&self) -> usize {
        self.pool.queued()
    }

    pub(super) fn settings_store(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    /// Persist a notification, then schedule its fan-out.
    #[tracing::instrument(
        name = "dispatcher.create",
        skip(self, new),
        fields(user_id = %new.user_id, notification_type = %new.notification_type)
    )]
    pub async fn create(&self, new: NewNotification) -> Result<NotificationId, DispatchError> {
        let notification = match self.store.insert(new).await {
            Ok(n) => n,
            Err(e) => {
                self.stats.persist_failures.fetch_add(1, Ordering::Relaxed);
                NotificationMetrics::record_persist_failure();
                if matches!(e, StoreError::Validation(_)) {
                    tracing::debug!(error = %e, "Rejected invalid notification");
                } else {
                    tracing::error!(error = %e, "Failed to persist notification");
                }
                return Err(e.into());
            }
        };

        self.stats.created.fetch_add(1, Ordering::Relaxed);
        NotificationMetrics::record_created(notification.notification_type);

        let id = notification.id;
        let job = DeliveryJob::new(notification.user_id.clone(), notification.payload());

        match self.pool.submit(job) {
            Ok(()) => {
                self.stats.jobs_submitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.jobs_rejected.fetch_add(1, Ordering::Relaxed);
                DeliveryMetrics::record_rejected();
                let reason = match e {
                    SubmitError::Full => "queue full",
                    SubmitError::Closed => "shutting down",
                };
                tracing::warn!(
                    notification_id = id,
                    reason,
                    "Delivery job rejected; notification stays retrievable via list"
                );
            }
        }

        tracing::info!(notification_id = id, "Notification created");
        Ok(id)
    }

    /// Positional form of `create()`
    pub async fn create_notification(
        &self,
        user_id: &str,
        notification_type: NotificationType,
        title: &str,
        message: &str,
        action_url: Option<&str>,
    ) -> Result<NotificationId, DispatchError> {
        self.create(NewNotification::new(
            user_id,
            notification_type,
            title,
            message,
            action_url.map(str::to_string),
        ))
        .await
    }

    /// Stop accepting delivery jobs and drain the queue.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.pool.shutdown(timeout).await
    }
}
