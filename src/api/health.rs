//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::channel_registry::ChannelStats;
use crate::notification::DispatcherStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub storage: StorageHealthResponse,
    pub push: PushHealthResponse,
    pub live: ChannelStats,
}

#[derive(Debug, Serialize)]
pub struct StorageHealthResponse {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_connections: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PushHealthResponse {
    pub provider: String,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub live: ChannelStats,
    pub delivery: DispatcherStatsSnapshot,
    pub queued_jobs: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let storage = match &state.stores.pool {
        Some(pool) => {
            let inner = pool.pool();
            StorageHealthResponse {
                backend: "postgres".to_string(),
                pool_size: Some(inner.size()),
                idle_connections: Some(inner.num_idle() as u32),
            }
        }
        None => StorageHealthResponse {
            backend: state.stores.notifications.backend_type().to_string(),
            pool_size: None,
            idle_connections: None,
        },
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        storage,
        push: PushHealthResponse {
            provider: state.push.provider().to_string(),
            enabled: state.push.is_enabled(),
        },
        live: state.channels.stats(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        live: state.channels.stats(),
        delivery: state.dispatcher.stats(),
        queued_jobs: state.dispatcher.queued_jobs(),
    })
}
