use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// JWT claims issued by the account service.
///
/// Only `sub` matters here: it is the user id that owns inbox rows, device
/// tokens, settings and the live session slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Owner of the caller's notifications
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,
    /// Ignored; kept so tokens carrying it still round-trip
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Claims {
    pub fn user_id(&self) -> &str {
        &self.sub
    }

    pub fn is_expired(&self) -> bool {
        self.exp < chrono::Utc::now().timestamp()
    }
}
