//! Bounded worker pool that runs fan-out jobs off the producer's path.
//!
//! Jobs go through a bounded mpsc queue shared by `workers` tasks. A full
//! queue rejects the job immediately instead of blocking the producer. On
//! shutdown the pool stops accepting work and the workers drain what is
//! already queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use super::delivery::Deliverer;
use super::types::NotificationPayload;

/// One notification to fan out
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    pub user_id: String,
    pub payload: NotificationPayload,
    pub enqueued_at: Instant,
}

impl DeliveryJob {
    pub fn new(user_id: impl Into<String>, payload: NotificationPayload) -> Self {
        Self {
            user_id: user_id.into(),
            payload,
            enqueued_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("delivery queue is full")]
    Full,
    #[error("delivery pool is shut down")]
    Closed,
}

pub struct DeliveryPool {
    sender: mpsc::Sender<DeliveryJob>,
    accepting: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DeliveryPool {
    /// Spawn `workers` tasks on the current runtime.
    pub fn start(deliverer: Arc<Deliverer>, workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    receiver.clone(),
                    deliverer.clone(),
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        tracing::info!(workers = workers.max(1), capacity = capacity.max(1), "Delivery pool started");

        Self {
            sender,
            accepting: AtomicBool::new(true),
            shutdown_tx,
            handles: Mutex::new(handles),
        }
    }

    /// Queue a job without waiting.
    pub fn submit(&self, job: DeliveryJob) -> Result<(), SubmitError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(SubmitError::Closed);
        }

        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::Full,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    /// Jobs waiting in the queue
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Stop accepting jobs and wait up to `timeout` for queued jobs to finish.
    ///
    /// Returns false if the workers were still busy when the timeout elapsed.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.accepting.store(false, Ordering::Release);
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock().await);
        let remaining = self.queued();

        match tokio::time::timeout(timeout, futures::future::join_all(handles)).await {
            Ok(_) => {
                tracing::info!(drained = remaining, "Delivery pool drained");
                true
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = timeout.as_secs(),
                    queued = self.queued(),
                    "Delivery pool did not drain before timeout"
                );
                false
            }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<DeliveryJob>>>,
    deliverer: Arc<Deliverer>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut draining = *shutdown.borrow();

    loop {
        let next = {
            let mut rx = receiver.lock().await;
            let received = if draining {
                None
            } else {
                tokio::select! {
                    job = rx.recv() => match job {
                        Some(job) => Some(job),
                        None => break,
                    },
                    _ = shutdown.changed() => {
                        draining = true;
                        None
                    }
                }
            };

            match received {
                Some(job) => Some(job),
                None => {
                    // A submit racing the shutdown flag either lands before
                    // this close and gets drained, or fails as Closed.
                    rx.close();
                    rx.try_recv().ok()
                }
            }
        };

        match next {
            Some(job) => deliverer.deliver(job).await,
            None => break,
        }
    }

    tracing::debug!(worker_id, "Delivery worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_registry::{ChannelKind, ChannelRegistry, LiveSession};
    use crate::device::MemoryDeviceTokenRegistry;
    use crate::notification::DispatcherStats;
    use crate::preferences::MemorySettingsStore;
    use crate::push::{test_payload, NoopPushGateway};

    fn deliverer(channels: Arc<ChannelRegistry>) -> Arc<Deliverer> {
        Arc::new(Deliverer::new(
            channels,
            Arc::new(MemoryDeviceTokenRegistry::new()),
            Arc::new(MemorySettingsStore::new()),
            Arc::new(NoopPushGateway),
            Duration::from_millis(200),
            Arc::new(DispatcherStats::default()),
        ))
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_jobs() {
        let channels = Arc::new(ChannelRegistry::new());
        let (tx, mut rx) = mpsc::channel(8);
        let (session, _close_rx) = LiveSession::new("u1", ChannelKind::Sse, tx);
        channels.register(Arc::new(session));

        let pool = DeliveryPool::start(deliverer(channels), 1, 8);
        for _ in 0..3 {
            pool.submit(DeliveryJob::new("u1", test_payload())).unwrap();
        }

        assert!(pool.shutdown(Duration::from_secs(5)).await);
        for _ in 0..3 {
            assert!(rx.try_recv().is_ok());
        }
    }

    #[tokio::test]
    async fn test_queue_refuses_jobs_once_drained() {
        let pool = DeliveryPool::start(deliverer(Arc::new(ChannelRegistry::new())), 2, 8);
        assert!(pool.shutdown(Duration::from_secs(5)).await);

        assert_eq!(
            pool.submit(DeliveryJob::new("u1", test_payload())),
            Err(SubmitError::Closed)
        );
        // A send that slipped past the accepting flag is refused, not stranded
        assert!(matches!(
            pool.sender.try_send(DeliveryJob::new("u1", test_payload())),
            Err(mpsc::error::TrySendError::Closed(_))
        ));
        assert_eq!(pool.queued(), 0);
    }
}
