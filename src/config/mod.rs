mod settings;

pub use settings::{
    ApiConfig, DeliveryConfig, JwtConfig, OtelConfig, PushConfig, ServerConfig, Settings,
    SseConfig, StorageConfig, TokenConfig, WebSocketConfig,
};
