//! Server-Sent Events live channel.
//!
//! `GET /api/notifications/stream?token=<JWT>` (or with a bearer header).
//!
//! # Event Types
//!
//! - `connect` - sent once when the stream opens
//! - `notification` - notification JSON (`id`, `type`, `title`, `message`,
//!   `isRead`, `createdAt`, `readAt`, `actionUrl`)
//!
//! The stream closes after `sse.timeout_seconds`; clients are expected to
//! reconnect. Opening a second stream for the same user closes the first.

mod handler;

pub use handler::{sse_handler, CONNECT_EVENT, NOTIFICATION_EVENT};
