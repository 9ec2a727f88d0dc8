//! Client for Spotify's accounts-service token endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::SpotifyConfig;
use crate::error::{OvertoneError, Result};

/// Token response from the Spotify accounts service.
///
/// Refresh responses routinely omit `refresh_token`; callers must keep using
/// the previous one in that case. `scope` may also be omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Exchanges authorization codes and refresh tokens for token pairs.
#[async_trait]
pub trait SpotifyAuthApi: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse>;
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse>;
}

/// HTTP client for the token endpoint, authenticating with the application's
/// registered client id/secret via HTTP Basic auth.
pub struct SpotifyAuthClient {
    authorize_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: Client,
}

impl SpotifyAuthClient {
    pub fn new(config: &SpotifyConfig) -> Self {
        Self::with_http_client(config, Client::new())
    }

    /// Create a client with a custom reqwest::Client (useful for testing).
    pub fn with_http_client(config: &SpotifyConfig, http: Client) -> Self {
        Self {
            authorize_url: config.authorize_url.trim_end_matches('/').to_string(),
            token_url: config.token_url.to_string(),
            client_id: config.client_id.to_string(),
            client_secret: config.client_secret.to_string(),
            redirect_uri: config.redirect_uri.to_string(),
            http,
        }
    }

    /// Build the user-facing authorization URL for the code flow.
    pub fn authorize_url(&self, state: &str, scope: &str) -> String {
        format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(scope),
            urlencoding::encode(state),
        )
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        debug!(url = %self.token_url, grant_type = form[0].1, "requesting token from Spotify");

        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Spotify token endpoint rejected the request");
            return Err(OvertoneError::AuthExchange { status, body });
        }

        let token: TokenResponse = response.json().await?;
        debug!("token grant succeeded");
        Ok(token)
    }
}

#[async_trait]
impl SpotifyAuthApi for SpotifyAuthClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }
}
