//! Opaque bearer token issuance and verification.

use std::collections::HashMap;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AuthError;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Presented as a bearer credential on API calls.
    Access,
    /// Exchanged for a fresh access token.
    Refresh,
}

#[derive(Debug, Clone)]
struct IssuedToken {
    username: String,
    kind: TokenKind,
    expires_at: OffsetDateTime,
}

/// Access/refresh pair returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TokenPair {
    /// Short-lived bearer credential.
    pub access: String,
    /// Longer-lived token for obtaining new access tokens.
    pub refresh: String,
}

/// Issues and checks tokens for a fixed set of accounts.
#[derive(Debug)]
pub struct TokenIssuer {
    accounts: HashMap<String, String>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    tokens: DashMap<String, IssuedToken>,
}

impl TokenIssuer {
    /// Create an issuer for `accounts` (username, password).
    pub fn new(
        accounts: impl IntoIterator<Item = (String, String)>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            accounts: accounts.into_iter().collect(),
            access_ttl,
            refresh_ttl,
            tokens: DashMap::new(),
        }
    }

    /// Trade a username/password for a token pair.
    pub fn obtain(&self, username: &str, password: &str) -> Result<TokenPair, AuthError> {
        self.obtain_at(username, password, OffsetDateTime::now_utc())
    }

    /// [`obtain`](Self::obtain) with an explicit clock.
    pub fn obtain_at(
        &self,
        username: &str,
        password: &str,
        now: OffsetDateTime,
    ) -> Result<TokenPair, AuthError> {
        match self.accounts.get(username) {
            Some(expected) if same_secret(expected.as_bytes(), password.as_bytes()) => {}
            _ => return Err(AuthError::BadCredentials),
        }

        self.purge_expired(now);
        Ok(TokenPair {
            access: self.issue(username, TokenKind::Access, now),
            refresh: self.issue(username, TokenKind::Refresh, now),
        })
    }

    /// Trade a refresh token for a new access token.
    pub fn refresh(&self, refresh: &str) -> Result<String, AuthError> {
        self.refresh_at(refresh, OffsetDateTime::now_utc())
    }

    /// [`refresh`](Self::refresh) with an explicit clock.
    pub fn refresh_at(&self, refresh: &str, now: OffsetDateTime) -> Result<String, AuthError> {
        self.purge_expired(now);
        let username = self
            .check(refresh, TokenKind::Refresh, now)
            .ok_or(AuthError::InvalidRefreshToken)?;
        Ok(self.issue(&username, TokenKind::Access, now))
    }

    /// Resolve an access token to the username it was issued to.
    pub fn authenticate(&self, access: &str) -> Result<String, AuthError> {
        self.authenticate_at(access, OffsetDateTime::now_utc())
    }

    /// [`authenticate`](Self::authenticate) with an explicit clock.
    pub fn authenticate_at(&self, access: &str, now: OffsetDateTime) -> Result<String, AuthError> {
        self.check(access, TokenKind::Access, now)
            .ok_or(AuthError::InvalidToken)
    }

    /// Drop every expired token. Returns how many were removed.
    pub fn purge_expired(&self, now: OffsetDateTime) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, token| token.expires_at > now);
        let removed = before.saturating_sub(self.tokens.len());
        if removed > 0 {
            debug!("Purged {} expired tokens", removed);
        }
        removed
    }

    /// Number of live (not yet purged) tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when no tokens are held.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn issue(&self, username: &str, kind: TokenKind, now: OffsetDateTime) -> String {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.insert(
            token.clone(),
            IssuedToken {
                username: username.to_string(),
                kind,
                expires_at: now + ttl,
            },
        );
        token
    }

    fn check(&self, token: &str, kind: TokenKind, now: OffsetDateTime) -> Option<String> {
        // Clone out so the shard lock is released before any removal.
        let issued = self.tokens.get(token).map(|entry| entry.value().clone())?;

        if issued.expires_at <= now {
            self.tokens.remove(token);
            return None;
        }
        (issued.kind == kind).then_some(issued.username)
    }
}

/// Byte comparison whose running time depends only on the lengths.
fn same_secret(expected: &[u8], given: &[u8]) -> bool {
    expected.len() == given.len()
        && expected
            .iter()
            .zip(given)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            [("testuser".to_string(), "testpass".to_string())],
            Duration::from_secs(300),
            Duration::from_secs(86_400),
        )
    }

    #[test]
    fn valid_credentials_yield_usable_access_token() {
        let issuer = issuer();

        let pair = issuer.obtain("testuser", "testpass").unwrap();

        assert_ne!(pair.access, pair.refresh);
        assert_eq!(issuer.authenticate(&pair.access).unwrap(), "testuser");
    }

    #[test]
    fn wrong_password_or_user_is_rejected() {
        let issuer = issuer();

        assert_eq!(
            issuer.obtain("testuser", "nope"),
            Err(AuthError::BadCredentials)
        );
        assert_eq!(
            issuer.obtain("someone", "testpass"),
            Err(AuthError::BadCredentials)
        );
        assert!(issuer.is_empty());
    }

    #[test]
    fn unknown_token_is_rejected() {
        assert_eq!(
            issuer().authenticate("not-a-token"),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn access_token_expires() {
        let issuer = issuer();
        let now = OffsetDateTime::now_utc();
        let pair = issuer.obtain_at("testuser", "testpass", now).unwrap();

        let later = now + Duration::from_secs(301);
        assert_eq!(
            issuer.authenticate_at(&pair.access, later),
            Err(AuthError::InvalidToken)
        );
        // Evicted on first failed use.
        assert_eq!(issuer.len(), 1);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let issuer = issuer();
        let pair = issuer.obtain("testuser", "testpass").unwrap();

        assert_eq!(
            issuer.authenticate(&pair.refresh),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(
            issuer.refresh(&pair.access),
            Err(AuthError::InvalidRefreshToken)
        );
    }

    #[test]
    fn refresh_issues_new_access_token() {
        let issuer = issuer();
        let now = OffsetDateTime::now_utc();
        let pair = issuer.obtain_at("testuser", "testpass", now).unwrap();

        let later = now + Duration::from_secs(600);
        let access = issuer.refresh_at(&pair.refresh, later).unwrap();

        assert_ne!(access, pair.access);
        assert_eq!(issuer.authenticate_at(&access, later).unwrap(), "testuser");
    }

    #[test]
    fn expired_refresh_token_is_rejected() {
        let issuer = issuer();
        let now = OffsetDateTime::now_utc();
        let pair = issuer.obtain_at("testuser", "testpass", now).unwrap();

        let later = now + Duration::from_secs(86_401);
        assert_eq!(
            issuer.refresh_at(&pair.refresh, later),
            Err(AuthError::InvalidRefreshToken)
        );
    }

    #[test]
    fn obtaining_purges_expired_tokens() {
        let issuer = issuer();
        let now = OffsetDateTime::now_utc();
        issuer.obtain_at("testuser", "testpass", now).unwrap();

        let later = now + Duration::from_secs(90_000);
        issuer.obtain_at("testuser", "testpass", later).unwrap();

        assert_eq!(issuer.len(), 2);
    }

    #[test]
    fn refreshing_purges_expired_tokens() {
        let issuer = issuer();
        let now = OffsetDateTime::now_utc();
        let pair = issuer.obtain_at("testuser", "testpass", now).unwrap();

        let later = now + Duration::from_secs(600);
        issuer.refresh_at(&pair.refresh, later).unwrap();

        // The expired access token is gone; the refresh token and the new
        // access token remain.
        assert_eq!(issuer.len(), 2);
        assert_eq!(
            issuer.authenticate_at(&pair.access, later),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn secret_comparison() {
        assert!(same_secret(b"testpass", b"testpass"));
        assert!(!same_secret(b"testpass", b"testpasS"));
        assert!(!same_secret(b"testpass", b"testpas"));
        assert!(!same_secret(b"", b"x"));
        assert!(same_secret(b"", b""));
    }
}
