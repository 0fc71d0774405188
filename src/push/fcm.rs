//! Firebase Cloud Messaging gateway (HTTP v1 API).
//!
//! The v1 API accepts one token per request, so a batch is sent as
//! concurrent per-token requests bounded by `push.max_concurrency`.
//! Results keep the input order.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use tokio::sync::Mutex;

use crate::config::PushConfig;
use crate::notification::NotificationPayload;

use super::gateway::{PushError, PushGateway, PushOutcome};
use super::models::{
    AssertionClaims, CachedToken, FcmErrorBody, FcmMessage, FcmRequest, GoogleTokenResponse,
    ServiceAccountKey,
};

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Error codes after which a token is dropped
const TERMINAL_CODES: [&str; 4] = ["UNREGISTERED", "INVALID_ARGUMENT", "SENDER_ID_MISMATCH", "NOT_FOUND"];

pub struct FcmPushGateway {
    project_id: String,
    credentials: ServiceAccountKey,
    encoding_key: EncodingKey,
    http_client: reqwest::Client,
    token_cache: Mutex<Option<CachedToken>>,
    max_concurrency: usize,
    icon: String,
    badge: String,
}

impl FcmPushGateway {
    /// Build a gateway from the service account file named in configuration.
    pub fn from_config(config: &PushConfig) -> Result<Self, PushError> {
        let raw = std::fs::read_to_string(&config.service_account_file)?;
        let credentials: ServiceAccountKey = serde_json::from_str(&raw)?;
        Self::new(credentials, config)
    }

    pub fn new(credentials: ServiceAccountKey, config: &PushConfig) -> Result<Self, PushError> {
        let encoding_key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|e| PushError::Config(format!("invalid private key: {}", e)))?;

        let project_id = config
            .project_id
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| credentials.project_id.clone());
        if project_id.is_empty() {
            return Err(PushError::Config("project_id is not configured".into()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        let icon = if config.icon.is_empty() {
            config.badge.clone()
        } else {
            config.icon.clone()
        };

        Ok(Self {
            project_id,
            credentials,
            encoding_key,
            http_client,
            token_cache: Mutex::new(None),
            max_concurrency: config.max_concurrency.max(1),
            icon,
            badge: config.badge.clone(),
        })
    }

    fn send_url(&self) -> String {
        format!(
            "https://fcm.googleapis.com/v1/projects/{}/messages:send",
            self.project_id
        )
    }

    /// OAuth2 access token, refreshed one minute before expiry.
    ///
    /// The cache lock is held across the refresh so concurrent sends share one exchange.
    async fn access_token(&self) -> Result<String, PushError> {
        let mut cache = self.token_cache.lock().await;
        let now = Utc::now().timestamp();

        if let Some(cached) = cache.as_ref() {
            if cached.expires_at > now + 60 {
                return Ok(cached.access_token.clone());
            }
        }

        let claims = AssertionClaims {
            iss: self.credentials.client_email.clone(),
            sub: self.credentials.client_email.clone(),
            scope: FCM_SCOPE.to_string(),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| PushError::Auth(format!("failed to sign assertion: {}", e)))?;

        let response = self
            .http_client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PushError::Auth(format!(
                "token exchange returned {}",
                response.status()
            )));
        }

        let token: GoogleTokenResponse = response.json().await?;
        *cache = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: now + token.expires_in,
        });

        tracing::debug!(expires_in = token.expires_in, "Refreshed FCM access token");
        Ok(token.access_token)
    }

    async fn send_one(&self, access_token: &str, token: &str, payload: &NotificationPayload) -> PushOutcome {
        let request = FcmRequest {
            message: FcmMessage::from_payload(token, payload, &self.icon, &self.badge),
        };

        let response = match self
            .http_client
            .post(self.send_url())
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return PushOutcome::Transient(format!("request failed: {}", e)),
        };

        let status = response.status();
        if status.is_success() {
            return PushOutcome::Success;
        }

        let body = response.text().await.unwrap_or_default();
        classify(status, &body)
    }
}

/// Map an FCM error response to a per-token outcome.
pub fn classify(status: StatusCode, body: &str) -> PushOutcome {
    let code = serde_json::from_str::<FcmErrorBody>(body).ok().and_then(|b| {
        b.error
            .details
            .iter()
            .find_map(|d| d.error_code.clone())
            .or(b.error.status)
    });

    match code {
        Some(code) if TERMINAL_CODES.contains(&code.as_str()) => PushOutcome::Terminal(code),
        Some(code) => PushOutcome::Transient(format!("{} {}", status.as_u16(), code)),
        None if status == StatusCode::NOT_FOUND => PushOutcome::Terminal("NOT_FOUND".to_string()),
        None => PushOutcome::Transient(status.to_string()),
    }
}

#[async_trait]
impl PushGateway for FcmPushGateway {
    async fn send_to_tokens(&self, tokens: &[String], payload: &NotificationPayload) -> Vec<PushOutcome> {
        if tokens.is_empty() {
            return Vec::new();
        }

        let access_token = match self.access_token().await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, tokens = tokens.len(), "FCM authentication failed");
                return tokens
                    .iter()
                    .map(|_| PushOutcome::Transient(e.to_string()))
                    .collect();
            }
        };

        let sends: Vec<_> = tokens
            .iter()
            .map(|token| self.send_one(&access_token, token, payload))
            .collect();
        stream::iter(sends)
            .buffered(self.max_concurrency)
            .collect()
            .await
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn provider(&self) -> &'static str {
        "fcm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregistered_is_terminal() {
        let body = r#"{"error":{"code":404,"status":"NOT_FOUND","message":"Requested entity was not found.",
            "details":[{"@type":"type.googleapis.com/google.firebase.fcm.v1.FcmError","errorCode":"UNREGISTERED"}]}}"#;
        assert_eq!(
            classify(StatusCode::NOT_FOUND, body),
            PushOutcome::Terminal("UNREGISTERED".into())
        );
    }

    #[test]
    fn test_invalid_argument_is_terminal() {
        let body = r#"{"error":{"code":400,"status":"INVALID_ARGUMENT","message":"The registration token is not a valid FCM registration token"}}"#;
        assert!(classify(StatusCode::BAD_REQUEST, body).is_terminal());
    }

    #[test]
    fn test_quota_and_server_errors_are_transient() {
        let body = r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED",
            "details":[{"errorCode":"QUOTA_EXCEEDED"}]}}"#;
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS, body),
            PushOutcome::Transient(_)
        ));

        assert!(matches!(
            classify(StatusCode::SERVICE_UNAVAILABLE, "upstream connect error"),
            PushOutcome::Transient(_)
        ));
    }

    #[test]
    fn test_bare_404_is_terminal() {
        assert!(classify(StatusCode::NOT_FOUND, "").is_terminal());
    }
}
