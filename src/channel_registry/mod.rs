//! Per-user directory of live WebSocket and SSE sessions.

mod registry;
mod types;

pub use registry::{ChannelRegistry, LiveChannels};
pub use types::{ChannelKind, ChannelStats, CloseReason, LiveSession, SendError};
