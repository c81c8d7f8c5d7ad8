use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Accepted bearer keys
#[derive(Clone, Default)]
pub struct ApiKeys {
    keys: Arc<HashSet<String>>,
}

impl ApiKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: HashSet<String> = keys
            .into_iter()
            .map(Into::into)
            .filter(|k| !k.is_empty())
            .collect();

        if keys.is_empty() {
            tracing::warn!("No API keys configured: authentication is DISABLED");
        } else {
            tracing::info!("✓ API authentication initialized with {} valid key(s)", keys.len());
        }

        Self {
            keys: Arc::new(keys),
        }
    }

    /// Authentication is only enforced when at least one key is configured
    pub fn is_enabled(&self) -> bool {
        !self.keys.is_empty()
    }

    fn is_valid(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Middleware to require authentication for protected endpoints
pub async fn require_auth(
    State(keys): State<ApiKeys>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !keys.is_enabled() {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header.and_then(|auth| auth.strip_prefix("Bearer ")) {
        Some(key) if keys.is_valid(key) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Invalid API key attempted");
            Err(StatusCode::UNAUTHORIZED)
        }
        None if auth_header.is_some() => {
            tracing::warn!("Invalid Authorization header format (expected Bearer token)");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Missing Authorization header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_validation() {
        let keys = ApiKeys::new(["test_key_123", "another_key_456", ""]);

        assert!(keys.is_enabled());
        assert!(keys.is_valid("test_key_123"));
        assert!(keys.is_valid("another_key_456"));
        assert!(!keys.is_valid("invalid_key"));
        assert!(!keys.is_valid(""));
    }

    #[test]
    fn test_no_keys_disables_auth() {
        assert!(!ApiKeys::new(Vec::<String>::new()).is_enabled());
        assert!(!ApiKeys::default().is_enabled());
    }
}
