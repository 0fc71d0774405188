use std::future::Future;
use std::sync::Arc;

use axum::{http::HeaderValue, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::api::api_routes;
use crate::shutdown::{GracefulShutdown, ShutdownResult};
use crate::websocket::ws_handler;

use super::AppState;

/// Request bodies are small JSON documents
const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        // WebSocket endpoint
        .route("/ws", get(ws_handler))
        .route("/ws/notifications", get(ws_handler))
        .merge(api_routes(state.clone()))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.settings.server.cors_origins))
        .with_state(state)
}

/// Serve until `signal` resolves, then run the shutdown sequence.
///
/// Live sessions are closed when the signal fires so open SSE responses end
/// and the server can finish in-flight requests. The delivery drain and the
/// database pool close only start after the server has returned.
pub async fn serve<F>(
    listener: TcpListener,
    state: AppState,
    shutdown_tx: broadcast::Sender<()>,
    signal: F,
) -> std::io::Result<ShutdownResult>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown = Arc::new(GracefulShutdown::new(state.clone(), shutdown_tx));
    let closer = shutdown.clone();

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(async move {
            signal.await;
            let closed = closer.close_sessions();
            tracing::info!(sessions_closed = closed, "Stopped accepting connections");
        })
        .await?;

    Ok(shutdown.execute().await)
}

/// Any origin unless `server.cors_origins` lists some
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(allowed)
    }
}
