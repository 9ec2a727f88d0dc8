//! Thin client for the Spotify Web API on behalf of a linked user.

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SpotifyConfig;
use crate::db::repository::SpotifyAccountRepository;
use crate::error::{OvertoneError, Result};

use super::auth::SpotifyAuthApi;
use super::tokens::TokenService;

/// Calls the Spotify Web API with tokens supplied by the lifecycle manager.
///
/// A 401 from Spotify gets exactly one retry with a re-validated token; the
/// manager only goes back to the network if the token really is stale, which
/// guards against a false 401 from clock skew. A second 401 means the
/// authorization itself is gone.
pub struct SpotifyClient<R, A> {
    api_base_url: String,
    http: Client,
    tokens: Arc<TokenService<R, A>>,
}

impl<R, A> SpotifyClient<R, A>
where
    R: SpotifyAccountRepository,
    A: SpotifyAuthApi,
{
    pub fn new(config: &SpotifyConfig, tokens: Arc<TokenService<R, A>>) -> Self {
        Self::with_http_client(config, tokens, Client::new())
    }

    /// Create a client with a custom reqwest::Client (useful for testing).
    pub fn with_http_client(
        config: &SpotifyConfig,
        tokens: Arc<TokenService<R, A>>,
        http: Client,
    ) -> Self {
        Self {
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            http,
            tokens,
        }
    }

    /// GET an endpoint with a specific bearer token, no retry. Also used
    /// during the OAuth callback before any tokens are stored.
    pub async fn get_with_token(&self, access_token: &str, endpoint: &str) -> Result<Value> {
        let url = format!("{}{endpoint}", self.api_base_url);
        debug!(url = %url, "calling Spotify API");

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(OvertoneError::ReauthorizationRequired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, endpoint, "Spotify API request failed");
            return Err(OvertoneError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// GET an endpoint on behalf of a user, retrying once on 401.
    pub async fn get(&self, user_id: &str, endpoint: &str) -> Result<Value> {
        let access_token = self.tokens.get_valid_access_token(user_id).await?;

        match self.get_with_token(&access_token, endpoint).await {
            Err(OvertoneError::ReauthorizationRequired) => {
                debug!(endpoint, "Spotify returned 401, retrying once with a re-validated token");
                let access_token = self.tokens.get_valid_access_token(user_id).await?;
                self.get_with_token(&access_token, endpoint).await
            }
            other => other,
        }
    }

    pub async fn get_me(&self, user_id: &str) -> Result<Value> {
        self.get(user_id, "/me").await
    }

    pub async fn get_top_tracks(
        &self,
        user_id: &str,
        time_range: &str,
        limit: u32,
    ) -> Result<Value> {
        self.get(
            user_id,
            &format!("/me/top/tracks?time_range={time_range}&limit={limit}"),
        )
        .await
    }

    pub async fn get_top_artists(
        &self,
        user_id: &str,
        time_range: &str,
        limit: u32,
    ) -> Result<Value> {
        self.get(
            user_id,
            &format!("/me/top/artists?time_range={time_range}&limit={limit}"),
        )
        .await
    }

    pub async fn get_recently_played(&self, user_id: &str, limit: u32) -> Result<Value> {
        self.get(user_id, &format!("/me/player/recently-played?limit={limit}"))
            .await
    }
}
