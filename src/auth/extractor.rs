use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::error::AppError;
use crate::server::AppState;

/// Caller of an end-user route, from `Authorization: Bearer` or `?token=`.
///
/// `user_id` is the token subject. Every inbox query, device token, settings
/// row and live session slot is scoped to it, so one user can never read or
/// mark another user's notifications. The query form exists for EventSource
/// and WebSocket clients, which cannot set headers.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| query_token(parts.uri.query()))
            .ok_or_else(|| AppError::Auth("Missing authentication token".into()))?;

        let claims = state.jwt_validator.validate(&token)?;
        Ok(AuthUser { user_id: claims.sub })
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub fn query_token(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| value.to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert!(bearer_token(&headers).is_none());
    }

    #[test]
    fn test_query_token() {
        assert_eq!(query_token(Some("token=abc")).as_deref(), Some("abc"));
        assert_eq!(query_token(Some("page=1&token=xyz")).as_deref(), Some("xyz"));
        assert!(query_token(Some("token=")).is_none());
        assert!(query_token(Some("tokens=abc")).is_none());
        assert!(query_token(None).is_none());
    }
}
