//! Live session handle and related types

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::websocket::ServerMessage;

/// Kind of live channel a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    WebSocket,
    Sse,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::WebSocket => "websocket",
            ChannelKind::Sse => "sse",
        }
    }
}

/// Why a live session left the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseReason {
    /// Client went away or the server is shutting down
    Normal,
    /// Server-side stream lifetime elapsed
    Timeout,
    /// Transport error or a failed send
    Error,
    /// A newer session of the same kind took the slot
    Replaced,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Normal => "normal",
            CloseReason::Timeout => "timeout",
            CloseReason::Error => "error",
            CloseReason::Replaced => "replaced",
        }
    }
}

/// Failure to hand a message to a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("session closed")]
    Closed,
    #[error("send timed out")]
    Timeout,
}

/// Handle for one live WebSocket or SSE session.
///
/// The transport task owns the receiving half of `sender` and watches the
/// close signal; `close()` asks it to terminate.
pub struct LiveSession {
    pub id: Uuid,
    pub user_id: String,
    pub kind: ChannelKind,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<ServerMessage>,
    close_tx: watch::Sender<Option<CloseReason>>,
}

impl LiveSession {
    /// Create a session handle plus the close signal receiver for its transport task.
    pub fn new(
        user_id: impl Into<String>,
        kind: ChannelKind,
        sender: mpsc::Sender<ServerMessage>,
    ) -> (Self, watch::Receiver<Option<CloseReason>>) {
        let (close_tx, close_rx) = watch::channel(None);
        let session = Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            kind,
            connected_at: Utc::now(),
            sender,
            close_tx,
        };
        (session, close_rx)
    }

    /// Queue a message for the transport, waiting at most `timeout` for capacity.
    pub async fn send(&self, message: ServerMessage, timeout: Duration) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }

        match tokio::time::timeout(timeout, self.sender.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SendError::Closed),
            Err(_) => Err(SendError::Timeout),
        }
    }

    /// Signal the transport task to shut down. The first reason wins.
    pub fn close(&self, reason: CloseReason) {
        self.close_tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    pub fn is_closed(&self) -> bool {
        self.close_tx.borrow().is_some() || self.sender.is_closed()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.close_tx.borrow()
    }
}

impl std::fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSession")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("kind", &self.kind)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

/// Registry statistics
#[derive(Debug, Clone, Serialize)]
pub struct ChannelStats {
    pub users: usize,
    pub websocket_sessions: usize,
    pub sse_sessions: usize,
}
