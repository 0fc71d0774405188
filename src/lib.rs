// Shared components
pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod telemetry;

// Domain layer
pub mod channel_registry;
pub mod device;
pub mod notification;
pub mod preferences;
pub mod push;

// Application layer
pub mod api;
pub mod auth;
pub mod server;
pub mod sse;
pub mod websocket;

// Supporting modules
pub mod shutdown;
pub mod tasks;
