//! FCM HTTP v1 wire models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::notification::NotificationPayload;

/// Firebase service account key file
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Claims of the OAuth2 JWT-bearer assertion
#[derive(Debug, Serialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub scope: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Deserialize)]
pub struct GoogleTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmRequest {
    pub message: FcmMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmMessage {
    pub token: String,
    pub notification: FcmNotification,
    pub data: BTreeMap<String, String>,
    pub webpush: WebpushConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmNotification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebpushConfig {
    pub notification: WebpushNotification,
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebpushNotification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
}

/// Error body returned by the v1 send endpoint
#[derive(Debug, Deserialize)]
pub struct FcmErrorBody {
    pub error: FcmErrorStatus,
}

#[derive(Debug, Deserialize)]
pub struct FcmErrorStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Vec<FcmErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct FcmErrorDetail {
    #[serde(rename = "errorCode", default)]
    pub error_code: Option<String>,
}

impl FcmMessage {
    /// Build the message for one token.
    ///
    /// Data values are strings because FCM rejects any other JSON type there.
    pub fn from_payload(token: &str, payload: &NotificationPayload, icon: &str, badge: &str) -> Self {
        let mut data = BTreeMap::new();
        data.insert("id".to_string(), payload.id.to_string());
        data.insert("type".to_string(), payload.notification_type.as_str().to_string());
        data.insert("title".to_string(), payload.title.clone());
        data.insert("message".to_string(), payload.message.clone());
        data.insert("isRead".to_string(), payload.is_read.to_string());
        data.insert("createdAt".to_string(), payload.created_at.to_rfc3339());
        if let Some(read_at) = payload.read_at {
            data.insert("readAt".to_string(), read_at.to_rfc3339());
        }
        if let Some(url) = &payload.action_url {
            data.insert("actionUrl".to_string(), url.clone());
        }

        let mut webpush_data = BTreeMap::new();
        webpush_data.insert("click_action".to_string(), payload.click_action().to_string());

        Self {
            token: token.to_string(),
            notification: FcmNotification {
                title: payload.title.clone(),
                body: payload.message.clone(),
            },
            data,
            webpush: WebpushConfig {
                notification: WebpushNotification {
                    title: payload.title.clone(),
                    body: payload.message.clone(),
                    icon: icon.to_string(),
                    badge: badge.to_string(),
                },
                data: webpush_data,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationType;
    use chrono::Utc;

    #[test]
    fn test_message_shape() {
        let payload = NotificationPayload {
            id: 7,
            notification_type: NotificationType::DiaryReminder,
            title: "일기 작성 시간입니다".into(),
            message: "오늘의 감정을 기록해보세요!".into(),
            is_read: false,
            created_at: Utc::now(),
            read_at: None,
            action_url: None,
        };

        let msg = FcmMessage::from_payload("tok", &payload, "/favicon.svg", "/favicon.svg");
        let value = serde_json::to_value(FcmRequest { message: msg }).unwrap();
        let m = &value["message"];

        assert_eq!(m["token"], "tok");
        assert_eq!(m["data"]["id"], "7");
        assert_eq!(m["data"]["type"], "DIARY_REMINDER");
        assert_eq!(m["data"]["isRead"], "false");
        assert!(m["data"]["createdAt"].is_string());
        assert!(m["data"].get("readAt").is_none());
        assert!(m["data"].get("actionUrl").is_none());
        assert_eq!(m["notification"]["body"], "오늘의 감정을 기록해보세요!");
        assert_eq!(m["webpush"]["notification"]["icon"], "/favicon.svg");
        assert_eq!(m["webpush"]["data"]["click_action"], "/diary/new");
    }

    #[test]
    fn test_data_carries_read_state() {
        let read_at = Utc::now();
        let payload = NotificationPayload {
            id: 8,
            notification_type: NotificationType::System,
            title: "t".into(),
            message: "m".into(),
            is_read: true,
            created_at: read_at,
            read_at: Some(read_at),
            action_url: Some("/settings".into()),
        };

        let msg = FcmMessage::from_payload("tok", &payload, "/favicon.svg", "/favicon.svg");

        assert_eq!(msg.data["isRead"], "true");
        assert_eq!(msg.data["readAt"], read_at.to_rfc3339());
        assert_eq!(msg.data["actionUrl"], "/settings");
    }
}
