//! Request gate requiring a valid bearer access token.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::TokenIssuer;
use crate::error::{ApiError, AuthError};
use crate::metrics;

/// Username of the caller, attached to authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

/// Reject the request with 401 unless it carries a live access token.
pub async fn require_bearer(
    State(tokens): State<Arc<TokenIssuer>>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = bearer_token(request.headers()).and_then(|token| tokens.authenticate(token));

    match outcome {
        Ok(username) => {
            request.extensions_mut().insert(AuthUser(username));
            next.run(request).await
        }
        Err(err) => {
            warn!(path = %request.uri().path(), "Rejected request: {}", err);
            metrics::inc_auth_failures();
            ApiError::Unauthorized(err).into_response()
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::InvalidScheme)?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::InvalidScheme),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc123")), Ok("abc123"));
        assert_eq!(bearer_token(&headers("bearer  abc123 ")), Ok("abc123"));
    }

    #[test]
    fn missing_header_is_reported_as_missing() {
        assert_eq!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingCredentials)
        );
    }

    #[test]
    fn other_schemes_are_rejected() {
        assert_eq!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthError::InvalidScheme)
        );
        assert_eq!(bearer_token(&headers("Bearer")), Err(AuthError::InvalidScheme));
        assert_eq!(bearer_token(&headers("Bearer ")), Err(AuthError::InvalidScheme));
    }
}
