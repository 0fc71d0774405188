//! Push delivery to devices without a live channel.
//!
//! The gateway is picked once at startup: FCM when `push.enabled` is set and
//! the service account loads, otherwise a no-op gateway.

mod fcm;
mod gateway;
mod models;

use std::sync::Arc;

pub use fcm::{classify, FcmPushGateway};
pub use gateway::{test_payload, NoopPushGateway, PushError, PushGateway, PushOutcome, PUSH_DISABLED};
pub use models::ServiceAccountKey;

use crate::config::PushConfig;

/// Select the push gateway for this process.
pub fn create_gateway(config: &PushConfig) -> Arc<dyn PushGateway> {
    if !config.enabled {
        tracing::info!("Push delivery disabled, using no-op gateway");
        return Arc::new(NoopPushGateway);
    }

    match FcmPushGateway::from_config(config) {
        Ok(gateway) => {
            tracing::info!(
                service_account = %config.service_account_file,
                "FCM push gateway initialized"
            );
            Arc::new(gateway)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                service_account = %config.service_account_file,
                "Failed to initialize FCM, using no-op gateway"
            );
            Arc::new(NoopPushGateway)
        }
    }
}
