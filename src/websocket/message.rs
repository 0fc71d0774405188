use serde::{Deserialize, Serialize};

use crate::notification::NotificationPayload;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Ping,
}

/// Messages sent from server to client, tagged by `event`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ServerMessage {
    #[serde(rename = "notification")]
    Notification(NotificationPayload),
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl ServerMessage {
    pub fn notification(payload: NotificationPayload) -> Self {
        Self::Notification(payload)
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationType;
    use chrono::Utc;

    #[test]
    fn test_notification_frame_is_flat() {
        let payload = NotificationPayload {
            id: 3,
            notification_type: NotificationType::Achievement,
            title: "목표 달성!".into(),
            message: "7 days in a row".into(),
            is_read: false,
            created_at: Utc::now(),
            read_at: None,
            action_url: Some("/dashboard".into()),
        };

        let value: serde_json::Value =
            serde_json::from_str(&ServerMessage::notification(payload).to_json().unwrap()).unwrap();
        assert_eq!(value["event"], "notification");
        assert_eq!(value["id"], 3);
        assert_eq!(value["type"], "ACHIEVEMENT");
        assert_eq!(value["actionUrl"], "/dashboard");
    }

    #[test]
    fn test_control_frames() {
        assert_eq!(ServerMessage::Pong.to_json().unwrap(), r#"{"event":"pong"}"#);

        let err: serde_json::Value =
            serde_json::from_str(&ServerMessage::error("INVALID_MESSAGE", "bad").to_json().unwrap()).unwrap();
        assert_eq!(err["event"], "error");
        assert_eq!(err["code"], "INVALID_MESSAGE");
    }

    #[test]
    fn test_client_ping() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe"}"#).is_err());
    }
}
