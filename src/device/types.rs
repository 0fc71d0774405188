use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::StoreError;

/// Platform a push token was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Web,
    Android,
    Ios,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Web => "web",
            DeviceType::Android => "android",
            DeviceType::Ios => "ios",
        }
    }

    /// Parse a client-supplied device type. `None` or blank means web.
    pub fn parse(value: Option<&str>) -> Result<Self, StoreError> {
        let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(DeviceType::Web);
        };

        match raw.to_ascii_lowercase().as_str() {
            "web" => Ok(DeviceType::Web),
            "android" => Ok(DeviceType::Android),
            "ios" => Ok(DeviceType::Ios),
            other => Err(StoreError::Validation(format!("unsupported deviceType: {}", other))),
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A push token row.
///
/// `(user_id, token)` is unique; re-registering updates this row in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceToken {
    pub id: i64,
    pub user_id: String,
    pub token: String,
    pub device_type: DeviceType,
    pub browser_info: Option<String>,
    pub is_active: bool,
    pub last_used_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration input
#[derive(Debug, Clone)]
pub struct TokenRegistration {
    pub user_id: String,
    pub token: String,
    pub device_type: DeviceType,
    pub browser_info: Option<String>,
}

impl TokenRegistration {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
            device_type,
            browser_info: None,
        }
    }

    pub fn with_browser_info(mut self, info: Option<String>) -> Self {
        self.browser_info = info;
        self
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.token.trim().is_empty() {
            return Err(StoreError::Validation("token is required".into()));
        }
        if self.token.len() > MAX_TOKEN_LEN {
            return Err(StoreError::Validation(format!("token exceeds {} bytes", MAX_TOKEN_LEN)));
        }
        if let Some(info) = &self.browser_info {
            if info.chars().count() > MAX_BROWSER_INFO_LEN {
                return Err(StoreError::Validation(format!(
                    "browserInfo exceeds {} characters",
                    MAX_BROWSER_INFO_LEN
                )));
            }
        }
        Ok(())
    }
}

pub const MAX_TOKEN_LEN: usize = 500;
pub const MAX_BROWSER_INFO_LEN: usize = 200;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_parse() {
        assert_eq!(DeviceType::parse(None).unwrap(), DeviceType::Web);
        assert_eq!(DeviceType::parse(Some("")).unwrap(), DeviceType::Web);
        assert_eq!(DeviceType::parse(Some("iOS")).unwrap(), DeviceType::Ios);
        assert_eq!(DeviceType::parse(Some(" ANDROID ")).unwrap(), DeviceType::Android);
        assert!(DeviceType::parse(Some("fridge")).is_err());
    }

    #[test]
    fn test_registration_requires_token() {
        let reg = TokenRegistration::new("u1", "   ", DeviceType::Web);
        assert!(matches!(reg.validate(), Err(StoreError::Validation(_))));

        let reg = TokenRegistration::new("u1", "abc", DeviceType::Web)
            .with_browser_info(Some("Firefox".into()));
        assert!(reg.validate().is_ok());
    }
}
