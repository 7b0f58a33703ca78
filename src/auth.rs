/// Authentication extractors
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};

use crate::{context::AppContext, error::CoffeyError};

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(String::from)
}

/// Admin authentication - requires the configured service token
#[derive(Debug, Clone)]
pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuth {
    type Rejection = CoffeyError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or_else(|| {
            CoffeyError::Authentication("Missing authorization header".to_string())
        })?;

        if token == state.config.authentication.admin_token {
            Ok(AdminAuth)
        } else {
            Err(CoffeyError::Authentication("Invalid admin token".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc123"));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc123"));
        assert!(extract_bearer_token(&headers).is_none());

        assert!(extract_bearer_token(&HeaderMap::new()).is_none());
    }
}
