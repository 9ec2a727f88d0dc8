//! Application session tokens and cookie handling.
//!
//! Sessions are signed JWTs delivered as HTTP-only cookies: a short-lived
//! access token and a long-lived refresh token marked with a `token_type`
//! claim so the two can never be swapped for each other.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use overtone_core::config::SessionConfig;
use overtone_core::error::{OvertoneError, Result};

use crate::error::ApiError;
use crate::AppState;

pub const ACCESS_COOKIE: &str = "auth_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const STATE_COOKIE: &str = "spotify_state";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iss: String,
    aud: String,
    jti: String,
    iat: i64,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
}

/// A freshly issued session token pair.
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Signs and verifies session JWTs with a process-wide HMAC secret.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionKeys {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_ttl: Duration::minutes(config.access_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_ttl_days),
        }
    }

    /// Issue an access/refresh pair for a user.
    pub fn issue_pair(&self, user_id: &str) -> Result<SessionTokens> {
        let (access_token, access_expires_at) = self.issue(user_id, self.access_ttl, None)?;
        let (refresh_token, refresh_expires_at) =
            self.issue(user_id, self.refresh_ttl, Some("refresh"))?;
        Ok(SessionTokens {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Issue a standalone access token, e.g. when rotating from a refresh
    /// token.
    pub fn issue_access(&self, user_id: &str) -> Result<(String, DateTime<Utc>)> {
        self.issue(user_id, self.access_ttl, None)
    }

    fn issue(
        &self,
        user_id: &str,
        ttl: Duration,
        token_type: Option<&str>,
    ) -> Result<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = Claims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            token_type: token_type.map(str::to_string),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| OvertoneError::Auth(format!("failed to sign session token: {e}")))?;
        Ok((token, expires_at))
    }

    /// Verify an access token and return the user id it was issued for.
    pub fn verify_access(&self, token: &str) -> Result<String> {
        let claims = self.verify(token)?;
        if claims.token_type.is_some() {
            return Err(OvertoneError::Auth(
                "refresh token used where an access token was expected".into(),
            ));
        }
        Ok(claims.sub)
    }

    /// Verify a refresh token and return the user id it was issued for.
    pub fn verify_refresh(&self, token: &str) -> Result<String> {
        let claims = self.verify(token)?;
        if claims.token_type.as_deref() != Some("refresh") {
            return Err(OvertoneError::Auth(
                "access token used where a refresh token was expected".into(),
            ));
        }
        Ok(claims.sub)
    }

    fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| OvertoneError::Auth(format!("invalid session token: {e}")))
    }
}

/// Extract a cookie value from a request's Cookie header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?;
    let cookie_str = cookie_header.to_str().ok()?;
    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie.strip_prefix(&format!("{name}=")) {
            return Some(value.to_string());
        }
    }
    None
}

/// Build a Set-Cookie value for an HTTP-only session cookie.
pub fn set_cookie(name: &str, value: &str, max_age_secs: i64) -> String {
    format!("{name}={value}; Path=/; Max-Age={max_age_secs}; HttpOnly; Secure; SameSite=None")
}

/// Build a Set-Cookie value that deletes a cookie.
pub fn clear_cookie(name: &str) -> String {
    format!("{name}=; Path=/; Max-Age=0; HttpOnly; Secure; SameSite=None")
}

/// The authenticated user for a request, read from the access-token cookie.
pub struct CurrentUser(pub String);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = cookie_value(&parts.headers, ACCESS_COOKIE)
            .ok_or_else(|| ApiError(OvertoneError::Auth("missing session cookie".into())))?;
        let user_id = state.sessions.verify_access(&token).map_err(ApiError)?;
        Ok(CurrentUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn test_keys() -> SessionKeys {
        SessionKeys::new(&SessionConfig {
            secret: "0123456789abcdef0123456789abcdef".into(),
            issuer: "overtone".into(),
            audience: "overtone-client".into(),
            access_ttl_minutes: 60,
            refresh_ttl_days: 30,
        })
    }

    #[test]
    fn issued_access_token_verifies() {
        let keys = test_keys();
        let pair = keys.issue_pair("user-001").unwrap();
        assert_eq!(keys.verify_access(&pair.access_token).unwrap(), "user-001");
        assert_eq!(
            keys.verify_refresh(&pair.refresh_token).unwrap(),
            "user-001"
        );
    }

    #[test]
    fn token_types_cannot_be_swapped() {
        let keys = test_keys();
        let pair = keys.issue_pair("user-001").unwrap();
        assert!(keys.verify_access(&pair.refresh_token).is_err());
        assert!(keys.verify_refresh(&pair.access_token).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let keys = test_keys();
        let pair = keys.issue_pair("user-001").unwrap();
        let mut tampered = pair.access_token.clone();
        tampered.pop();
        assert!(keys.verify_access(&tampered).is_err());
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let keys = test_keys();
        let other = SessionKeys::new(&SessionConfig {
            secret: "ffffffffffffffffffffffffffffffff".into(),
            issuer: "overtone".into(),
            audience: "overtone-client".into(),
            access_ttl_minutes: 60,
            refresh_ttl_days: 30,
        });
        let pair = other.issue_pair("user-001").unwrap();
        assert!(keys.verify_access(&pair.access_token).is_err());
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let keys = test_keys();
        let other = SessionKeys::new(&SessionConfig {
            secret: "0123456789abcdef0123456789abcdef".into(),
            issuer: "overtone".into(),
            audience: "someone-else".into(),
            access_ttl_minutes: 60,
            refresh_ttl_days: 30,
        });
        let pair = other.issue_pair("user-001").unwrap();
        assert!(keys.verify_access(&pair.access_token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = SessionKeys::new(&SessionConfig {
            secret: "0123456789abcdef0123456789abcdef".into(),
            issuer: "overtone".into(),
            audience: "overtone-client".into(),
            access_ttl_minutes: -5,
            refresh_ttl_days: 30,
        });
        let pair = keys.issue_pair("user-001").unwrap();
        assert!(keys.verify_access(&pair.access_token).is_err());
    }

    #[test]
    fn cookie_value_parses_multiple_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("a=1; auth_token=tok-123; b=2"),
        );
        assert_eq!(
            cookie_value(&headers, ACCESS_COOKIE).as_deref(),
            Some("tok-123")
        );
        assert!(cookie_value(&headers, "missing").is_none());
    }

    #[test]
    fn cookie_value_without_header_is_none() {
        let headers = HeaderMap::new();
        assert!(cookie_value(&headers, ACCESS_COOKIE).is_none());
    }

    #[test]
    fn set_and_clear_cookie_attributes() {
        let set = set_cookie("auth_token", "abc", 3600);
        assert!(set.contains("auth_token=abc"));
        assert!(set.contains("HttpOnly"));
        assert!(set.contains("SameSite=None"));
        assert!(set.contains("Max-Age=3600"));

        let clear = clear_cookie("auth_token");
        assert!(clear.starts_with("auth_token=;"));
        assert!(clear.contains("Max-Age=0"));
    }
}
