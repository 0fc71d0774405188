use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::server::{api_key_auth, AppState};
use crate::sse::sse_handler;

use super::devices::{register_token, send_test_push, unregister_all_tokens, unregister_token};
use super::health::{health, stats};
use super::internal::{create_notification, produce_notification};
use super::metrics::prometheus_metrics;
use super::notifications::{
    list_notifications, list_unread, mark_all_as_read, mark_as_read, send_test_notification,
    unread_count,
};
use super::settings::{get_settings, update_settings};

pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Caller's inbox, settings, live stream and device tokens
        .nest(
            "/api/notifications",
            Router::new()
                .route("/", get(list_notifications))
                .route("/unread", get(list_unread))
                .route("/unread/count", get(unread_count))
                .route("/{id}/read", put(mark_as_read))
                .route("/read-all", put(mark_all_as_read))
                .route("/settings", get(get_settings).put(update_settings))
                .route("/stream", get(sse_handler))
                .route("/test", post(send_test_notification))
                .route("/fcm/register", post(register_token))
                .route("/fcm/unregister", post(unregister_token))
                .route("/fcm/unregister-all", post(unregister_all_tokens))
                .route("/fcm/test", post(send_test_push)),
        )
        // Producer entry points
        .nest(
            "/internal",
            Router::new()
                .route("/notifications", post(create_notification))
                .route("/notifications/producer", post(produce_notification))
                .layer(middleware::from_fn_with_state(state, api_key_auth)),
        )
}
