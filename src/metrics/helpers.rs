//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::channel_registry::{ChannelKind, CloseReason};
use crate::notification::NotificationType;
use crate::push::PushOutcome;

use super::{
    DELIVERY_JOBS_COMPLETED_TOTAL, DELIVERY_JOBS_REJECTED_TOTAL, DELIVERY_LATENCY,
    LIVE_DELIVERIES_TOTAL, LIVE_SESSIONS, LIVE_USERS, NOTIFICATIONS_CREATED_TOTAL,
    NOTIFICATIONS_SUPPRESSED_TOTAL, PERSIST_FAILURES_TOTAL, PUSH_OUTCOMES_TOTAL,
    PUSH_TOKENS_DEACTIVATED_TOTAL, SESSIONS_CLOSED_TOTAL, SESSIONS_OPENED_TOTAL, TOKENS_SWEPT_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Live session lifecycle
pub struct SessionMetrics;

impl SessionMetrics {
    pub fn record_opened(kind: ChannelKind) {
        SESSIONS_OPENED_TOTAL.with_label_values(&[kind.as_str()]).inc();
        LIVE_SESSIONS.with_label_values(&[kind.as_str()]).inc();
    }

    pub fn record_closed(kind: ChannelKind, reason: CloseReason) {
        SESSIONS_CLOSED_TOTAL
            .with_label_values(&[kind.as_str(), reason.as_str()])
            .inc();
        LIVE_SESSIONS.with_label_values(&[kind.as_str()]).dec();
    }

    pub fn set_users(count: usize) {
        LIVE_USERS.set(count as i64);
    }
}

pub struct NotificationMetrics;

impl NotificationMetrics {
    pub fn record_created(notification_type: NotificationType) {
        NOTIFICATIONS_CREATED_TOTAL
            .with_label_values(&[notification_type.as_str()])
            .inc();
    }

    pub fn record_suppressed(notification_type: NotificationType) {
        NOTIFICATIONS_SUPPRESSED_TOTAL
            .with_label_values(&[notification_type.as_str()])
            .inc();
    }

    pub fn record_persist_failure() {
        PERSIST_FAILURES_TOTAL.inc();
    }
}

pub struct DeliveryMetrics;

impl DeliveryMetrics {
    pub fn record_live(kind: ChannelKind, delivered: bool) {
        let result = if delivered { "delivered" } else { "failed" };
        LIVE_DELIVERIES_TOTAL
            .with_label_values(&[kind.as_str(), result])
            .inc();
    }

    pub fn record_rejected() {
        DELIVERY_JOBS_REJECTED_TOTAL.inc();
    }

    pub fn record_completed(latency_secs: f64) {
        DELIVERY_JOBS_COMPLETED_TOTAL.inc();
        DELIVERY_LATENCY.observe(latency_secs);
    }
}

pub struct PushMetrics;

impl PushMetrics {
    pub fn record_outcome(outcome: &PushOutcome) {
        PUSH_OUTCOMES_TOTAL
            .with_label_values(&[outcome.label()])
            .inc();
    }

    pub fn record_deactivated() {
        PUSH_TOKENS_DEACTIVATED_TOTAL.inc();
    }

    pub fn record_swept(count: u64) {
        TOKENS_SWEPT_TOTAL.inc_by(count);
    }
}
