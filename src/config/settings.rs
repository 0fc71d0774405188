use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub sse: SseConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// Shared key for the internal producer endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Heartbeat interval in seconds (server sends ping)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseConfig {
    /// Hard server-side stream lifetime; clients reconnect after it
    #[serde(default = "default_sse_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_sse_keep_alive")]
    pub keep_alive_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Number of delivery workers
    #[serde(default = "default_delivery_workers")]
    pub workers: usize,
    /// Pending jobs beyond this are rejected (the row is already persisted)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// A live send slower than this marks the session broken
    #[serde(default = "default_live_send_timeout_ms")]
    pub live_send_timeout_ms: u64,
    /// How long shutdown waits for queued jobs
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Selects the FCM gateway; otherwise the no-op gateway is wired
    #[serde(default)]
    pub enabled: bool,
    /// Path to the Firebase service account JSON
    #[serde(default = "default_service_account_file")]
    pub service_account_file: String,
    /// Overrides the project id in the service account file
    pub project_id: Option<String>,
    #[serde(default = "default_push_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_push_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_icon")]
    pub badge: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// "memory" (default) or "postgres"
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
    /// Apply embedded migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Inactive tokens older than this are purged
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_heartbeat_interval() -> u64 {
    30 // 30 seconds
}

fn default_sse_timeout() -> u64 {
    30 * 60 // 30 minutes
}

fn default_sse_keep_alive() -> u64 {
    15
}

fn default_delivery_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_live_send_timeout_ms() -> u64 {
    2000
}

fn default_drain_timeout() -> u64 {
    10
}

fn default_service_account_file() -> String {
    "firebase-service-account.json".to_string()
}

fn default_push_concurrency() -> usize {
    16
}

fn default_push_timeout() -> u64 {
    10
}

fn default_icon() -> String {
    "/favicon.svg".to_string()
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    600
}

fn default_true() -> bool {
    true
}

fn default_retention_days() -> i64 {
    30
}

fn default_sweep_interval() -> u64 {
    24 * 60 * 60 // daily
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "notification-fanout".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, JWT__SECRET, PUSH__ENABLED, STORAGE__URL, ...
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(","),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would fail later at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tokens.sweep_cutoff(chrono::Utc::now())?;
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
        }
    }
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_sse_timeout(),
            keep_alive_seconds: default_sse_keep_alive(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            workers: default_delivery_workers(),
            queue_capacity: default_queue_capacity(),
            live_send_timeout_ms: default_live_send_timeout_ms(),
            drain_timeout_seconds: default_drain_timeout(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_account_file: default_service_account_file(),
            project_id: None,
            max_concurrency: default_push_concurrency(),
            request_timeout_seconds: default_push_timeout(),
            icon: default_icon(),
            badge: default_icon(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            url: String::new(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            run_migrations: true,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl TokenConfig {
    /// Oldest `updated_at` an inactive token may have at `now` and survive a sweep.
    pub fn sweep_cutoff(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<chrono::DateTime<chrono::Utc>, ConfigError> {
        chrono::Duration::try_days(self.retention_days)
            .and_then(|retention| now.checked_sub_signed(retention))
            .ok_or_else(|| {
                ConfigError::Message(format!(
                    "tokens.retention_days out of range: {}",
                    self.retention_days
                ))
            })
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);
    }

    #[test]
    fn test_delivery_and_sse_defaults() {
        let sse = SseConfig::default();
        assert_eq!(sse.timeout_seconds, 1800);

        let delivery = DeliveryConfig::default();
        assert!(delivery.workers > 0);
        assert!(delivery.queue_capacity > 0);

        let tokens = TokenConfig::default();
        assert_eq!(tokens.retention_days, 30);
    }

    #[test]
    fn test_push_disabled_by_default() {
        let push = PushConfig::default();
        assert!(!push.enabled);
        assert_eq!(push.icon, "/favicon.svg");
    }

    #[test]
    fn test_deserialize_minimal() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "jwt": { "secret": "s3cret" }
        }))
        .unwrap();

        assert_eq!(settings.jwt.secret, "s3cret");
        assert_eq!(settings.storage.backend, "memory");
        assert_eq!(settings.server_addr(), "0.0.0.0:8080");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_retention_out_of_range_is_a_config_error() {
        let now = chrono::Utc::now();
        let tokens = TokenConfig::default();
        assert_eq!(tokens.sweep_cutoff(now).unwrap(), now - chrono::Duration::days(30));

        let absurd = TokenConfig {
            retention_days: i64::MAX,
            ..TokenConfig::default()
        };
        assert!(matches!(absurd.sweep_cutoff(now), Err(ConfigError::Message(_))));

        let settings: Settings = serde_json::from_value(serde_json::json!({
            "jwt": { "secret": "s3cret" },
            "tokens": { "retention_days": 10_000_000_000i64 }
        }))
        .unwrap();
        assert!(settings.validate().is_err());
    }
}
