use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::auth::AuthUser;
use crate::channel_registry::{ChannelKind, CloseReason, LiveSession};
use crate::server::AppState;

use super::message::{ClientMessage, ServerMessage};

const CHANNEL_BUFFER_SIZE: usize = 32;

/// Control frames from the receive loop wait at most this long for buffer space
const CONTROL_SEND_TIMEOUT: Duration = Duration::from_millis(500);

/// WebSocket upgrade handler
#[tracing::instrument(name = "ws.upgrade", skip(ws, state, user), fields(user_id = %user.user_id))]
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>, user: AuthUser) -> Response {
    tracing::info!("WebSocket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state, user.user_id))
}

/// Handle an established WebSocket connection
#[tracing::instrument(
    name = "ws.connection",
    skip(socket, state),
    fields(otel.kind = "server")
)]
async fn handle_socket(socket: WebSocket, state: AppState, user_id: String) {
    let connection_start = std::time::Instant::now();

    let (tx, mut rx) = mpsc::channel::<ServerMessage>(CHANNEL_BUFFER_SIZE);
    let (session, mut close_rx) = LiveSession::new(user_id.clone(), ChannelKind::WebSocket, tx);
    let session = Arc::new(session);
    let session_id = session.id;

    state.channels.register(session.clone());

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let heartbeat = Duration::from_secs(state.settings.websocket.heartbeat_interval.max(1));

    // Channel -> socket. Also owns the close signal and the ping timer.
    let mut send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(heartbeat);
        ping.tick().await;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else { return CloseReason::Normal };
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize message");
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text.into())).await.is_err() {
                        return CloseReason::Error;
                    }
                }
                changed = close_rx.changed() => {
                    let reason = if changed.is_ok() {
                        (*close_rx.borrow()).unwrap_or(CloseReason::Normal)
                    } else {
                        CloseReason::Normal
                    };
                    let code = match reason {
                        CloseReason::Error => close_code::ERROR,
                        CloseReason::Normal => close_code::AWAY,
                        CloseReason::Timeout | CloseReason::Replaced => close_code::NORMAL,
                    };
                    let _ = ws_sender
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.as_str().into(),
                        })))
                        .await;
                    return reason;
                }
                _ = ping.tick() => {
                    if ws_sender.send(Message::Ping(Default::default())).await.is_err() {
                        return CloseReason::Error;
                    }
                }
            }
        }
    });

    // Socket -> server
    let recv_session = session.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if !process_message(msg, &recv_session).await {
                        return CloseReason::Normal;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket receive error");
                    return CloseReason::Error;
                }
            }
        }
        CloseReason::Normal
    });

    let reason = tokio::select! {
        r = &mut send_task => {
            recv_task.abort();
            r.unwrap_or(CloseReason::Error)
        }
        r = &mut recv_task => {
            send_task.abort();
            r.unwrap_or(CloseReason::Error)
        }
    };

    // A reason set by the registry (replaced, evicted) takes precedence
    let reason = session.close_reason().unwrap_or(reason);
    state
        .channels
        .unregister(&user_id, ChannelKind::WebSocket, session_id, reason);

    tracing::info!(
        session_id = %session_id,
        reason = reason.as_str(),
        duration_secs = connection_start.elapsed().as_secs_f64(),
        "WebSocket connection closed"
    );
}

/// Process a received WebSocket message
/// Returns false if the connection should be closed
async fn process_message(msg: Message, session: &Arc<LiveSession>) -> bool {
    match msg {
        Message::Text(text) => {
            let reply = match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping) => ServerMessage::Pong,
                Err(e) => {
                    tracing::debug!(session_id = %session.id, error = %e, "Failed to parse client message");
                    ServerMessage::error("INVALID_MESSAGE", e.to_string())
                }
            };
            let _ = session.send(reply, CONTROL_SEND_TIMEOUT).await;
            true
        }
        Message::Binary(_) => {
            let _ = session
                .send(
                    ServerMessage::error("UNSUPPORTED_FORMAT", "Binary messages are not supported"),
                    CONTROL_SEND_TIMEOUT,
                )
                .await;
            true
        }
        // axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(session_id = %session.id, "Received close frame");
            false
        }
    }
}
