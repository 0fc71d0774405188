use std::sync::Arc;
use std::time::Instant;

use crate::auth::JwtValidator;
use crate::channel_registry::ChannelRegistry;
use crate::config::Settings;
use crate::notification::FanoutDispatcher;
use crate::push::{create_gateway, PushGateway};
use crate::storage::{create_stores, PostgresPoolError, Stores};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Arc<JwtValidator>,
    pub channels: Arc<ChannelRegistry>,
    pub stores: Stores,
    pub push: Arc<dyn PushGateway>,
    pub dispatcher: Arc<FanoutDispatcher>,
    pub start_time: Instant,
}

impl AppState {
    /// Build the stores and push gateway named by configuration and wire
    /// them together. Must run inside a Tokio runtime.
    pub async fn new(settings: Settings) -> Result<Self, PostgresPoolError> {
        let stores = create_stores(&settings.storage).await?;
        let push = create_gateway(&settings.push);
        Ok(Self::with_components(settings, stores, push))
    }

    /// Wire already-built stores and gateway.
    pub fn with_components(settings: Settings, stores: Stores, push: Arc<dyn PushGateway>) -> Self {
        let jwt_validator = Arc::new(JwtValidator::new(&settings.jwt));
        let channels = Arc::new(ChannelRegistry::new());
        let dispatcher = Arc::new(FanoutDispatcher::new(
            stores.notifications.clone(),
            channels.clone(),
            stores.tokens.clone(),
            stores.settings.clone(),
            push.clone(),
            &settings.delivery,
        ));

        tracing::info!(
            notification_backend = stores.notifications.backend_type(),
            token_backend = stores.tokens.backend_type(),
            settings_backend = stores.settings.backend_type(),
            push_provider = push.provider(),
            push_enabled = push.is_enabled(),
            "Application state initialized"
        );

        Self {
            settings: Arc::new(settings),
            jwt_validator,
            channels,
            stores,
            push,
            dispatcher,
            start_time: Instant::now(),
        }
    }
}
