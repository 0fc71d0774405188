//! Prometheus metrics for the fan-out service.
//!
//! - Live session metrics (open sessions, opened/closed by channel and reason)
//! - Notification metrics (created by type, persistence failures)
//! - Delivery metrics (live sends, rejected jobs, latency)
//! - Push metrics (per-token outcomes, deactivations)
//! - Token sweep metrics

mod helpers;

pub use helpers::{encode_metrics, DeliveryMetrics, NotificationMetrics, PushMetrics, SessionMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "fanout";

lazy_static! {
    // ============================================================================
    // Live Session Metrics
    // ============================================================================

    /// Currently registered live sessions by channel kind
    pub static ref LIVE_SESSIONS: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_live_sessions", METRIC_PREFIX),
        "Currently registered live sessions",
        &["channel"]
    ).unwrap();

    /// Users with at least one live session
    pub static ref LIVE_USERS: IntGauge = register_int_gauge!(
        format!("{}_live_users", METRIC_PREFIX),
        "Users with at least one live session"
    ).unwrap();

    pub static ref SESSIONS_OPENED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_sessions_opened_total", METRIC_PREFIX),
        "Total live sessions opened",
        &["channel"]
    ).unwrap();

    pub static ref SESSIONS_CLOSED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_sessions_closed_total", METRIC_PREFIX),
        "Total live sessions closed",
        &["channel", "reason"]
    ).unwrap();

    // ============================================================================
    // Notification Metrics
    // ============================================================================

    pub static ref NOTIFICATIONS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_created_total", METRIC_PREFIX),
        "Total notifications persisted",
        &["type"]
    ).unwrap();

    pub static ref NOTIFICATIONS_SUPPRESSED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_suppressed_total", METRIC_PREFIX),
        "Producer notifications skipped because of user settings",
        &["type"]
    ).unwrap();

    pub static ref PERSIST_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_persist_failures_total", METRIC_PREFIX),
        "Total notification writes that failed"
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Live channel sends by channel and result (delivered, failed)
    pub static ref LIVE_DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_live_deliveries_total", METRIC_PREFIX),
        "Total live channel sends",
        &["channel", "result"]
    ).unwrap();

    /// Delivery jobs dropped because the worker queue was full or closed
    pub static ref DELIVERY_JOBS_REJECTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_delivery_jobs_rejected_total", METRIC_PREFIX),
        "Total delivery jobs rejected by the worker pool"
    ).unwrap();

    pub static ref DELIVERY_JOBS_COMPLETED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_delivery_jobs_completed_total", METRIC_PREFIX),
        "Total delivery jobs completed by the worker pool"
    ).unwrap();

    /// Time from persistence to the end of fan-out for one notification
    pub static ref DELIVERY_LATENCY: Histogram = register_histogram!(
        format!("{}_delivery_latency_seconds", METRIC_PREFIX),
        "Fan-out latency in seconds",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    // ============================================================================
    // Push Metrics
    // ============================================================================

    /// Per-token push outcomes (success, transient, terminal)
    pub static ref PUSH_OUTCOMES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_push_outcomes_total", METRIC_PREFIX),
        "Total push outcomes per token",
        &["outcome"]
    ).unwrap();

    pub static ref PUSH_TOKENS_DEACTIVATED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_push_tokens_deactivated_total", METRIC_PREFIX),
        "Tokens deactivated after a terminal push failure"
    ).unwrap();

    pub static ref TOKENS_SWEPT_TOTAL: IntCounter = register_int_counter!(
        format!("{}_tokens_swept_total", METRIC_PREFIX),
        "Inactive device tokens deleted by the sweep task"
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics() {
        // lazy_static requires first access
        LIVE_USERS.set(1);

        let output = encode_metrics().unwrap();
        assert!(output.contains("fanout_live_users"));
    }

    #[test]
    fn test_delivery_metrics() {
        LIVE_DELIVERIES_TOTAL.with_label_values(&["sse", "delivered"]).inc();
        DELIVERY_JOBS_REJECTED_TOTAL.inc();
        DELIVERY_LATENCY.observe(0.02);
        PUSH_OUTCOMES_TOTAL.with_label_values(&["terminal"]).inc();
        TOKENS_SWEPT_TOTAL.inc_by(3);
    }
}
