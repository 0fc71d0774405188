use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::config::TokenConfig;
use crate::device::DeviceTokenRegistry;
use crate::metrics::PushMetrics;

/// Background task that purges inactive device tokens past retention
pub struct TokenSweepTask {
    config: TokenConfig,
    registry: Arc<dyn DeviceTokenRegistry>,
    shutdown: broadcast::Receiver<()>,
}

impl TokenSweepTask {
    pub fn new(
        config: TokenConfig,
        registry: Arc<dyn DeviceTokenRegistry>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            registry,
            shutdown,
        }
    }

    /// Run until the shutdown signal fires
    pub async fn run(mut self) {
        let interval = Duration::from_secs(self.config.sweep_interval_seconds.max(1));
        let mut timer = tokio::time::interval(interval);

        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(
            sweep_interval_secs = self.config.sweep_interval_seconds,
            retention_days = self.config.retention_days,
            "Token sweep task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Token sweep task received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    self.sweep_once().await;
                }
            }
        }

        tracing::info!("Token sweep task stopped");
    }

    /// Delete inactive tokens not touched within the retention window.
    pub async fn sweep_once(&self) -> u64 {
        let cutoff = match self.config.sweep_cutoff(Utc::now()) {
            Ok(cutoff) => cutoff,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping device token sweep");
                return 0;
            }
        };

        match self.registry.sweep(cutoff).await {
            Ok(removed) => {
                PushMetrics::record_swept(removed);
                if removed > 0 {
                    tracing::info!(removed, cutoff = %cutoff, "Purged inactive device tokens");
                } else {
                    tracing::debug!(cutoff = %cutoff, "No inactive device tokens to purge");
                }
                removed
            }
            Err(e) => {
                tracing::warn!(error = %e, "Device token sweep failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceType, MemoryDeviceTokenRegistry, TokenRegistration};

    #[tokio::test]
    async fn test_sweep_task_shutdown() {
        let registry: Arc<dyn DeviceTokenRegistry> = Arc::new(MemoryDeviceTokenRegistry::new());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = TokenSweepTask::new(TokenConfig::default(), registry, shutdown_rx);

        let handle = tokio::spawn(task.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("Task should complete")
            .expect("Task should not panic");
    }

    #[tokio::test]
    async fn test_sweep_keeps_recent_and_active_tokens() {
        let registry = Arc::new(MemoryDeviceTokenRegistry::new());
        registry
            .register(TokenRegistration::new("u1", "active", DeviceType::Web))
            .await
            .unwrap();
        registry
            .register(TokenRegistration::new("u1", "recently-dropped", DeviceType::Android))
            .await
            .unwrap();
        registry.deactivate("u1", "recently-dropped").await.unwrap();

        let (_tx, rx) = broadcast::channel(1);
        let task = TokenSweepTask::new(TokenConfig::default(), registry.clone(), rx);

        // Deactivated just now, well inside the 30 day window
        assert_eq!(task.sweep_once().await, 0);
        assert_eq!(registry.list_active("u1").await.unwrap(), vec!["active".to_string()]);

        let purge_all = TokenSweepTask::new(
            TokenConfig {
                retention_days: -1,
                ..TokenConfig::default()
            },
            registry.clone(),
            broadcast::channel(1).1,
        );
        assert_eq!(purge_all.sweep_once().await, 1);
        assert_eq!(registry.count_active("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sweep_skips_out_of_range_retention() {
        let registry = Arc::new(MemoryDeviceTokenRegistry::new());
        registry
            .register(TokenRegistration::new("u1", "dropped", DeviceType::Web))
            .await
            .unwrap();
        registry.deactivate("u1", "dropped").await.unwrap();

        let task = TokenSweepTask::new(
            TokenConfig {
                retention_days: i64::MIN,
                ..TokenConfig::default()
            },
            registry.clone(),
            broadcast::channel(1).1,
        );
        assert_eq!(task.sweep_once().await, 0);
    }
}
