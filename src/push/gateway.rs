//! Push provider abstraction.

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use crate::notification::{NotificationPayload, NotificationType};

/// Result of pushing to a single device token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Success,
    /// Provider or network hiccup; the token stays active
    Transient(String),
    /// The provider says the token will never work again
    Terminal(String),
}

impl PushOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PushOutcome::Success => "success",
            PushOutcome::Transient(_) => "transient",
            PushOutcome::Terminal(_) => "terminal",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PushOutcome::Terminal(_))
    }
}

/// Errors building or authenticating a push gateway
#[derive(Debug, Error)]
pub enum PushError {
    #[error("Push configuration error: {0}")]
    Config(String),

    #[error("Push provider authentication failed: {0}")]
    Auth(String),

    #[error("Failed to read service account: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid service account JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Adapter to an external push provider.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Send `payload` to every token. The result has one outcome per input
    /// token, in input order.
    async fn send_to_tokens(&self, tokens: &[String], payload: &NotificationPayload) -> Vec<PushOutcome>;

    /// Whether this gateway talks to a real provider
    fn is_enabled(&self) -> bool;

    fn provider(&self) -> &'static str;
}

/// Gateway used when push delivery is turned off
pub struct NoopPushGateway;

pub const PUSH_DISABLED: &str = "push delivery disabled";

#[async_trait]
impl PushGateway for NoopPushGateway {
    async fn send_to_tokens(&self, tokens: &[String], _payload: &NotificationPayload) -> Vec<PushOutcome> {
        tokens
            .iter()
            .map(|_| PushOutcome::Transient(PUSH_DISABLED.to_string()))
            .collect()
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn provider(&self) -> &'static str {
        "noop"
    }
}

/// Payload used by the "send a test push" endpoint
pub fn test_payload() -> NotificationPayload {
    NotificationPayload {
        id: 0,
        notification_type: NotificationType::System,
        title: "테스트 알림".to_string(),
        message: "FCM 연동이 성공적으로 구성되었습니다!".to_string(),
        is_read: false,
        created_at: Utc::now(),
        read_at: None,
        action_url: Some("/".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_reports_transient_per_token() {
        let gateway = NoopPushGateway;
        let tokens = vec!["a".to_string(), "b".to_string()];
        let outcomes = gateway.send_to_tokens(&tokens, &test_payload()).await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| matches!(o, PushOutcome::Transient(_))));
        assert!(!gateway.is_enabled());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(PushOutcome::Success.label(), "success");
        assert!(PushOutcome::Terminal("UNREGISTERED".into()).is_terminal());
        assert!(!PushOutcome::Transient("503".into()).is_terminal());
    }
}
