//! HTTP endpoints organized by concern.

mod devices;
mod health;
mod internal;
mod metrics;
mod notifications;
mod routes;
mod settings;

pub use devices::{
    register_token, send_test_push, unregister_all_tokens, unregister_token, DeactivatedResponse,
    TestPushResponse, TokenRequest,
};
pub use health::{health, stats, HealthResponse, StatsResponse};
pub use internal::{create_notification, produce_notification, CreatedResponse, ProducerRequest, ProducerResponse};
pub use metrics::prometheus_metrics;
pub use notifications::{
    list_notifications, list_unread, mark_all_as_read, mark_as_read, send_test_notification,
    unread_count, UpdatedResponse,
};
pub use routes::api_routes;
pub use settings::{get_settings, update_settings};
