//! SSE handler implementation.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::stream::Stream;
use tokio::sync::{mpsc, watch};

use crate::auth::AuthUser;
use crate::channel_registry::{ChannelKind, CloseReason, LiveSession};
use crate::server::AppState;
use crate::websocket::ServerMessage;

const CHANNEL_BUFFER_SIZE: usize = 32;

pub const CONNECT_EVENT: &str = "connect";
pub const NOTIFICATION_EVENT: &str = "notification";

/// SSE stream handler
#[tracing::instrument(name = "sse.connect", skip(state, user), fields(user_id = %user.user_id))]
pub async fn sse_handler(State(state): State<AppState>, user: AuthUser) -> Response {
    let (tx, rx) = mpsc::channel::<ServerMessage>(CHANNEL_BUFFER_SIZE);
    let (session, close_rx) = LiveSession::new(user.user_id.clone(), ChannelKind::Sse, tx);
    let session = Arc::new(session);

    state.channels.register(session.clone());

    tracing::info!(session_id = %session.id, "SSE connection established");

    let lifetime = Duration::from_secs(state.settings.sse.timeout_seconds);
    let keep_alive = Duration::from_secs(state.settings.sse.keep_alive_seconds.max(1));

    let stream = create_sse_stream(rx, close_rx, lifetime, CleanupGuard::new(session, state));

    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(keep_alive))
        .into_response()
}

/// Build the event stream: one `connect` event, then notifications until the
/// session is closed, the client disconnects or `lifetime` elapses.
fn create_sse_stream(
    mut rx: mpsc::Receiver<ServerMessage>,
    mut close_rx: watch::Receiver<Option<CloseReason>>,
    lifetime: Duration,
    mut guard: CleanupGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        yield Ok(Event::default().event(CONNECT_EVENT).data("SSE connection established"));

        let deadline = tokio::time::sleep(lifetime);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    if let Some(event) = to_event(&msg) {
                        yield Ok(event);
                    }
                }
                _ = close_rx.changed() => {
                    break;
                }
                _ = &mut deadline => {
                    tracing::debug!(session_id = %guard.session.id, "SSE stream lifetime elapsed");
                    guard.reason = CloseReason::Timeout;
                    break;
                }
            }
        }
    }
}

/// Map a server message to an SSE event. Only notifications are streamed;
/// liveness is covered by the keep-alive comments.
fn to_event(msg: &ServerMessage) -> Option<Event> {
    match msg {
        ServerMessage::Notification(payload) => match serde_json::to_string(payload) {
            Ok(json) => Some(Event::default().event(NOTIFICATION_EVENT).data(json)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize SSE notification");
                None
            }
        },
        _ => None,
    }
}

/// Unregisters the session when the stream is dropped, which covers client
/// disconnects as well as server-side termination.
struct CleanupGuard {
    session: Arc<LiveSession>,
    state: AppState,
    started: Instant,
    reason: CloseReason,
}

impl CleanupGuard {
    fn new(session: Arc<LiveSession>, state: AppState) -> Self {
        Self {
            session,
            state,
            started: Instant::now(),
            reason: CloseReason::Normal,
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let reason = self.session.close_reason().unwrap_or(self.reason);
        self.session.close(reason);
        self.state.channels.unregister(
            &self.session.user_id,
            ChannelKind::Sse,
            self.session.id,
            reason,
        );

        tracing::info!(
            session_id = %self.session.id,
            user_id = %self.session.user_id,
            reason = reason.as_str(),
            duration_secs = self.started.elapsed().as_secs_f64(),
            "SSE connection closed"
        );
    }
}
