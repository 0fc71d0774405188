use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::metrics::SessionMetrics;

use super::types::{ChannelKind, ChannelStats, CloseReason, LiveSession};

/// Live slots for one user: at most one session per channel kind
#[derive(Default)]
struct UserSlots {
    websocket: Option<Arc<LiveSession>>,
    sse: Option<Arc<LiveSession>>,
}

impl UserSlots {
    fn slot_mut(&mut self, kind: ChannelKind) -> &mut Option<Arc<LiveSession>> {
        match kind {
            ChannelKind::WebSocket => &mut self.websocket,
            ChannelKind::Sse => &mut self.sse,
        }
    }

    fn is_empty(&self) -> bool {
        self.websocket.is_none() && self.sse.is_none()
    }
}

/// Snapshot of a user's live sessions
#[derive(Debug, Default, Clone)]
pub struct LiveChannels {
    pub websocket: Option<Arc<LiveSession>>,
    pub sse: Option<Arc<LiveSession>>,
}

impl LiveChannels {
    pub fn is_empty(&self) -> bool {
        self.websocket.is_none() && self.sse.is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<LiveSession>> {
        self.websocket.iter().chain(self.sse.iter())
    }
}

/// Directory of live sessions keyed by user id.
///
/// All mutation goes through the per-key entry guard of the map, so users
/// never contend with each other and a slot swap is never observed halfway.
pub struct ChannelRegistry {
    slots: DashMap<String, UserSlots>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Install a session in its user's slot, closing whatever it replaces.
    ///
    /// Returns the replaced session, already signalled to close.
    pub fn register(&self, session: Arc<LiveSession>) -> Option<Arc<LiveSession>> {
        let kind = session.kind;
        let replaced = {
            let mut slots = self.slots.entry(session.user_id.clone()).or_default();
            slots.slot_mut(kind).replace(session.clone())
        };

        SessionMetrics::record_opened(kind);

        if let Some(old) = &replaced {
            old.close(CloseReason::Replaced);
            SessionMetrics::record_closed(kind, CloseReason::Replaced);
            tracing::info!(
                user_id = %session.user_id,
                channel = kind.as_str(),
                old_session = %old.id,
                new_session = %session.id,
                "Live session replaced"
            );
        } else {
            tracing::info!(
                user_id = %session.user_id,
                channel = kind.as_str(),
                session_id = %session.id,
                "Live session registered"
            );
        }

        SessionMetrics::set_users(self.slots.len());
        replaced
    }

    /// Remove the slot if it still holds `session_id`.
    ///
    /// A session that was already replaced does not disturb its successor.
    /// Returns whether a slot was cleared.
    pub fn unregister(&self, user_id: &str, kind: ChannelKind, session_id: Uuid, reason: CloseReason) -> bool {
        let removed = match self.slots.get_mut(user_id) {
            Some(mut slots) => {
                let slot = slots.slot_mut(kind);
                if slot.as_ref().is_some_and(|s| s.id == session_id) {
                    slot.take()
                } else {
                    None
                }
            }
            None => None,
        };

        self.slots.remove_if(user_id, |_, slots| slots.is_empty());

        let Some(session) = removed else {
            return false;
        };

        session.close(reason);
        SessionMetrics::record_closed(kind, reason);
        SessionMetrics::set_users(self.slots.len());

        tracing::info!(
            user_id = %user_id,
            channel = kind.as_str(),
            session_id = %session_id,
            reason = reason.as_str(),
            "Live session unregistered"
        );

        true
    }

    /// Drop a session whose send failed and signal its transport to stop.
    pub fn evict(&self, session: &LiveSession) -> bool {
        let removed = self.unregister(&session.user_id, session.kind, session.id, CloseReason::Error);
        session.close(CloseReason::Error);
        removed
    }

    /// Current sessions for a user. Never blocks on other users.
    pub fn lookup(&self, user_id: &str) -> LiveChannels {
        self.slots
            .get(user_id)
            .map(|slots| LiveChannels {
                websocket: slots.websocket.clone(),
                sse: slots.sse.clone(),
            })
            .unwrap_or_default()
    }

    /// Close and remove every session. Returns how many were closed.
    pub fn close_all(&self, reason: CloseReason) -> usize {
        let sessions: Vec<Arc<LiveSession>> = self
            .slots
            .iter()
            .flat_map(|entry| {
                entry
                    .websocket
                    .iter()
                    .chain(entry.sse.iter())
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut closed = 0;
        for session in sessions {
            if self.unregister(&session.user_id, session.kind, session.id, reason) {
                closed += 1;
            }
        }
        closed
    }

    pub fn stats(&self) -> ChannelStats {
        let mut websocket_sessions = 0;
        let mut sse_sessions = 0;
        for entry in self.slots.iter() {
            websocket_sessions += entry.websocket.is_some() as usize;
            sse_sessions += entry.sse.is_some() as usize;
        }

        ChannelStats {
            users: self.slots.len(),
            websocket_sessions,
            sse_sessions,
        }
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_registry::SendError;
    use crate::websocket::ServerMessage;
    use tokio::sync::{mpsc, watch};

    fn session(user: &str, kind: ChannelKind) -> (Arc<LiveSession>, mpsc::Receiver<ServerMessage>, watch::Receiver<Option<CloseReason>>) {
        let (tx, rx) = mpsc::channel(8);
        let (session, close_rx) = LiveSession::new(user, kind, tx);
        (Arc::new(session), rx, close_rx)
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ChannelRegistry::new();
        let (ws, _rx, _c) = session("u1", ChannelKind::WebSocket);
        let (sse, _rx2, _c2) = session("u1", ChannelKind::Sse);

        assert!(registry.register(ws.clone()).is_none());
        assert!(registry.register(sse.clone()).is_none());

        let live = registry.lookup("u1");
        assert_eq!(live.websocket.unwrap().id, ws.id);
        assert_eq!(live.sse.unwrap().id, sse.id);
        assert!(registry.lookup("u2").is_empty());
    }

    #[test]
    fn test_second_websocket_replaces_and_closes_first() {
        let registry = ChannelRegistry::new();
        let (first, _rx1, close1) = session("u1", ChannelKind::WebSocket);
        let (second, _rx2, close2) = session("u1", ChannelKind::WebSocket);

        registry.register(first.clone());
        let replaced = registry.register(second.clone()).unwrap();

        assert_eq!(replaced.id, first.id);
        assert_eq!(*close1.borrow(), Some(CloseReason::Replaced));
        assert_eq!(*close2.borrow(), None);
        assert_eq!(registry.lookup("u1").websocket.unwrap().id, second.id);
        assert_eq!(registry.stats().websocket_sessions, 1);
    }

    #[test]
    fn test_stale_unregister_keeps_successor() {
        let registry = ChannelRegistry::new();
        let (first, _rx1, _c1) = session("u1", ChannelKind::Sse);
        let (second, _rx2, _c2) = session("u1", ChannelKind::Sse);

        registry.register(first.clone());
        registry.register(second.clone());

        // the replaced session's transport cleans up late
        assert!(!registry.unregister("u1", ChannelKind::Sse, first.id, CloseReason::Normal));
        assert_eq!(registry.lookup("u1").sse.unwrap().id, second.id);

        assert!(registry.unregister("u1", ChannelKind::Sse, second.id, CloseReason::Timeout));
        assert!(registry.lookup("u1").is_empty());
        assert_eq!(registry.stats().users, 0);
    }

    #[test]
    fn test_slots_are_independent() {
        let registry = ChannelRegistry::new();
        let (ws, _rx1, _c1) = session("u1", ChannelKind::WebSocket);
        let (sse, _rx2, _c2) = session("u1", ChannelKind::Sse);
        registry.register(ws.clone());
        registry.register(sse.clone());

        registry.unregister("u1", ChannelKind::WebSocket, ws.id, CloseReason::Normal);
        let live = registry.lookup("u1");
        assert!(live.websocket.is_none());
        assert_eq!(live.sse.unwrap().id, sse.id);
    }

    #[test]
    fn test_evict_closes_session() {
        let registry = ChannelRegistry::new();
        let (ws, _rx, close_rx) = session("u1", ChannelKind::WebSocket);
        registry.register(ws.clone());

        assert!(registry.evict(&ws));
        assert_eq!(*close_rx.borrow(), Some(CloseReason::Error));
        assert!(registry.lookup("u1").is_empty());
    }

    #[test]
    fn test_close_all() {
        let registry = ChannelRegistry::new();
        let mut receivers = Vec::new();
        for user in ["a", "b", "c"] {
            let (ws, rx, close_rx) = session(user, ChannelKind::WebSocket);
            registry.register(ws);
            receivers.push((rx, close_rx));
        }

        assert_eq!(registry.close_all(CloseReason::Normal), 3);
        assert_eq!(registry.stats().users, 0);
        for (_, close_rx) in &receivers {
            assert_eq!(*close_rx.borrow(), Some(CloseReason::Normal));
        }
    }

    #[tokio::test]
    async fn test_send_to_closed_session_fails() {
        let (ws, rx, _c) = session("u1", ChannelKind::WebSocket);
        drop(rx);
        let result = ws.send(ServerMessage::Pong, std::time::Duration::from_millis(50)).await;
        assert_eq!(result, Err(SendError::Closed));
    }

    #[tokio::test]
    async fn test_send_times_out_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let (ws, _c) = LiveSession::new("u1", ChannelKind::WebSocket, tx);
        ws.send(ServerMessage::Pong, std::time::Duration::from_millis(50)).await.unwrap();

        let result = ws.send(ServerMessage::Pong, std::time::Duration::from_millis(20)).await;
        assert_eq!(result, Err(SendError::Timeout));
    }
}
