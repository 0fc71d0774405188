//! Per-notification fan-out across live channels and push.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::channel_registry::{ChannelRegistry, LiveSession};
use crate::device::DeviceTokenRegistry;
use crate::metrics::{DeliveryMetrics, PushMetrics};
use crate::preferences::SettingsStore;
use crate::push::{PushGateway, PushOutcome};
use crate::websocket::ServerMessage;

use super::dispatcher::DispatcherStats;
use super::worker::DeliveryJob;

/// Shortened token for log lines
fn token_prefix(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(12)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}

/// Runs one delivery job. Every channel is independent: a failure on one
/// never stops the others, and nothing is reported back to the producer.
pub struct Deliverer {
    channels: Arc<ChannelRegistry>,
    tokens: Arc<dyn DeviceTokenRegistry>,
    settings: Arc<dyn SettingsStore>,
    push: Arc<dyn PushGateway>,
    live_send_timeout: Duration,
    stats: Arc<DispatcherStats>,
}

impl Deliverer {
    pub fn new(
        channels: Arc<ChannelRegistry>,
        tokens: Arc<dyn DeviceTokenRegistry>,
        settings: Arc<dyn SettingsStore>,
        push: Arc<dyn PushGateway>,
        live_send_timeout: Duration,
        stats: Arc<DispatcherStats>,
    ) -> Self {
        Self {
            channels,
            tokens,
            settings,
            push,
            live_send_timeout,
            stats,
        }
    }

    #[tracing::instrument(
        name = "delivery.deliver",
        skip(self, job),
        fields(user_id = %job.user_id, notification_id = job.payload.id)
    )]
    pub async fn deliver(&self, job: DeliveryJob) {
        tokio::join!(self.deliver_live(&job), self.deliver_push(&job));

        self.stats.jobs_completed.fetch_add(1, Ordering::Relaxed);
        DeliveryMetrics::record_completed(job.enqueued_at.elapsed().as_secs_f64());
        tracing::debug!(
            elapsed_ms = job.enqueued_at.elapsed().as_millis() as u64,
            "Delivery job completed"
        );
    }

    async fn deliver_live(&self, job: &DeliveryJob) {
        let live = self.channels.lookup(&job.user_id);
        if live.is_empty() {
            return;
        }

        join_all(live.iter().map(|session| self.send_live(session, job))).await;
    }

    /// Best effort, no retry. A failed send evicts the session.
    async fn send_live(&self, session: &Arc<LiveSession>, job: &DeliveryJob) {
        let message = ServerMessage::notification(job.payload.clone());

        match session.send(message, self.live_send_timeout).await {
            Ok(()) => {
                self.stats.live_delivered.fetch_add(1, Ordering::Relaxed);
                DeliveryMetrics::record_live(session.kind, true);
                tracing::debug!(
                    channel = session.kind.as_str(),
                    session_id = %session.id,
                    "Live delivery succeeded"
                );
            }
            Err(e) => {
                self.stats.live_failed.fetch_add(1, Ordering::Relaxed);
                DeliveryMetrics::record_live(session.kind, false);
                tracing::warn!(
                    channel = session.kind.as_str(),
                    session_id = %session.id,
                    error = %e,
                    "Live delivery failed, closing session"
                );
                self.channels.evict(session);
            }
        }
    }

    async fn deliver_push(&self, job: &DeliveryJob) {
        match self.settings.find(&job.user_id).await {
            Ok(Some(settings)) if !settings.push_notifications_enabled => {
                self.stats.push_skipped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Push disabled in user settings, skipping");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read settings, assuming push allowed");
            }
        }

        let tokens = match self.tokens.list_active(&job.user_id).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list device tokens, skipping push");
                return;
            }
        };

        if tokens.is_empty() {
            return;
        }

        let outcomes = self.push.send_to_tokens(&tokens, &job.payload).await;
        if outcomes.len() != tokens.len() {
            tracing::warn!(
                tokens = tokens.len(),
                outcomes = outcomes.len(),
                provider = self.push.provider(),
                "Push gateway returned mismatched outcome count"
            );
        }

        for (token, outcome) in tokens.iter().zip(outcomes) {
            PushMetrics::record_outcome(&outcome);
            self.handle_outcome(&job.user_id, token, outcome).await;
        }
    }

    async fn handle_outcome(&self, user_id: &str, token: &str, outcome: PushOutcome) {
        match outcome {
            PushOutcome::Success => {
                self.stats.push_success.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = self.tokens.mark_used(user_id, token).await {
                    tracing::debug!(error = %e, "Failed to refresh token last_used_at");
                }
            }
            PushOutcome::Transient(reason) => {
                self.stats.push_transient.fetch_add(1, Ordering::Relaxed);
                if self.push.is_enabled() {
                    tracing::info!(
                        token = token_prefix(token),
                        reason = %reason,
                        "Transient push failure"
                    );
                } else {
                    tracing::debug!(token = token_prefix(token), reason = %reason, "Push skipped");
                }
            }
            PushOutcome::Terminal(reason) => {
                self.stats.push_terminal.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    token = token_prefix(token),
                    reason = %reason,
                    "Terminal push failure, deactivating token"
                );
                match self.tokens.deactivate(user_id, token).await {
                    Ok(true) => PushMetrics::record_deactivated(),
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(error = %e, token = token_prefix(token), "Failed to deactivate token");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_prefix() {
        assert_eq!(token_prefix("short"), "short");
        assert_eq!(token_prefix("abcdefghijklmnopqrstuvwxyz"), "abcdefghijkl");
    }
}
