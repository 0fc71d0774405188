//! Prometheus metrics endpoint.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};

use crate::metrics;
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    update_metrics_from_state(&state);

    match metrics::encode_metrics() {
        Ok(output) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Resync the live gauges with the registry before a scrape
fn update_metrics_from_state(state: &AppState) {
    let live = state.channels.stats();
    metrics::LIVE_USERS.set(live.users as i64);
    metrics::LIVE_SESSIONS
        .with_label_values(&["websocket"])
        .set(live.websocket_sessions as i64);
    metrics::LIVE_SESSIONS
        .with_label_values(&["sse"])
        .set(live.sse_sessions as i64);
}
