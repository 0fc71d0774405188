//! Graceful shutdown handling for the fan-out service.
//!
//! Order matters. Live sessions are closed as soon as the signal arrives,
//! otherwise open SSE responses keep the server from finishing its drain.
//! Everything else runs after the server has stopped serving requests:
//! background tasks are told to stop, the delivery pool drains whatever is
//! queued, and finally the database pool is closed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::channel_registry::CloseReason;
use crate::server::AppState;

/// Handles graceful shutdown of the fan-out service
pub struct GracefulShutdown {
    state: AppState,
    shutdown_tx: broadcast::Sender<()>,
    drain_timeout: Duration,
    sessions_closed: AtomicUsize,
}

/// Result of a graceful shutdown operation
#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Live sessions closed
    pub sessions_closed: usize,
    /// Whether the delivery queue drained within the timeout
    pub queue_drained: bool,
    pub duration: Duration,
}

impl GracefulShutdown {
    pub fn new(state: AppState, shutdown_tx: broadcast::Sender<()>) -> Self {
        let drain_timeout = Duration::from_secs(state.settings.delivery.drain_timeout_seconds);
        Self {
            state,
            shutdown_tx,
            drain_timeout,
            sessions_closed: AtomicUsize::new(0),
        }
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Close every registered live session. Safe to call more than once.
    pub fn close_sessions(&self) -> usize {
        let closed = self.state.channels.close_all(CloseReason::Normal);
        self.sessions_closed.fetch_add(closed, Ordering::Relaxed);
        closed
    }

    /// Execute graceful shutdown sequence.
    ///
    /// Call once the server has stopped serving requests.
    #[tracing::instrument(name = "graceful_shutdown", skip(self))]
    pub async fn execute(&self) -> ShutdownResult {
        let start = Instant::now();
        let mut result = ShutdownResult::default();

        // Sessions that registered while in-flight requests finished
        let stragglers = self.close_sessions();
        tracing::info!(stragglers, "Phase 1: Closing live sessions");
        result.sessions_closed = self.sessions_closed.load(Ordering::Relaxed);

        tracing::info!("Phase 2: Signaling background tasks to stop");
        let _ = self.shutdown_tx.send(());

        tracing::info!(
            queued_jobs = self.state.dispatcher.queued_jobs(),
            "Phase 3: Draining delivery queue"
        );
        result.queue_drained = self.state.dispatcher.shutdown(self.drain_timeout).await;
        if !result.queue_drained {
            tracing::warn!(
                remaining_jobs = self.state.dispatcher.queued_jobs(),
                "Delivery drain timed out; remaining notifications stay retrievable via list"
            );
        }

        if let Some(pool) = &self.state.stores.pool {
            tracing::info!("Phase 4: Closing database pool");
            pool.close().await;
        }

        result.duration = start.elapsed();
        tracing::info!(
            sessions_closed = result.sessions_closed,
            queue_drained = result.queue_drained,
            duration_ms = result.duration.as_millis() as u64,
            "Graceful shutdown completed"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_registry::{ChannelKind, LiveSession};
    use crate::config::Settings;
    use crate::push::NoopPushGateway;
    use crate::storage::Stores;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn test_state() -> AppState {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "jwt": { "secret": "test-secret" }
        }))
        .unwrap();
        AppState::with_components(settings, Stores::memory(), Arc::new(NoopPushGateway))
    }

    #[tokio::test]
    async fn test_shutdown_closes_sessions_and_stops_tasks() {
        let state = test_state();
        let (tx, _rx) = mpsc::channel(4);
        let (session, close_rx) = LiveSession::new("u1", ChannelKind::Sse, tx);
        state.channels.register(Arc::new(session));

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let shutdown = GracefulShutdown::new(state.clone(), shutdown_tx)
            .with_drain_timeout(Duration::from_secs(1));

        let result = shutdown.execute().await;

        assert_eq!(result.sessions_closed, 1);
        assert!(result.queue_drained);
        assert_eq!(*close_rx.borrow(), Some(CloseReason::Normal));
        assert!(shutdown_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_sessions_closed_counts_early_and_late_sessions() {
        let state = test_state();
        let (shutdown_tx, _rx) = broadcast::channel(1);
        let shutdown = GracefulShutdown::new(state.clone(), shutdown_tx)
            .with_drain_timeout(Duration::from_secs(1));

        let (tx, _rx1) = mpsc::channel(4);
        let (early, _close1) = LiveSession::new("u1", ChannelKind::Sse, tx);
        state.channels.register(Arc::new(early));
        assert_eq!(shutdown.close_sessions(), 1);

        let (tx, _rx2) = mpsc::channel(4);
        let (late, late_close) = LiveSession::new("u2", ChannelKind::WebSocket, tx);
        state.channels.register(Arc::new(late));

        let result = shutdown.execute().await;
        assert_eq!(result.sessions_closed, 2);
        assert_eq!(*late_close.borrow(), Some(CloseReason::Normal));
    }
}
