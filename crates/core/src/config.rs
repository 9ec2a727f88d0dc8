//! TOML-based configuration system for Overtone.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OvertoneError, Result};

/// Top-level Overtone configuration, deserialized from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvertoneConfig {
    pub overtone: OvertoneSection,
    pub spotify: SpotifyConfig,
    pub session: SessionConfig,
}

/// Core instance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvertoneSection {
    pub data_dir: String,
    /// Base URL the browser client is served from; OAuth redirects land there.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Database backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: Some("/var/lib/overtone/overtone.db".into()),
        }
    }
}

/// Spotify application credentials and token lifecycle tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Redirect URI registered with the Spotify application.
    pub redirect_uri: String,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Safety margin subtracted from token lifetimes so a token is never
    /// used while it expires mid-flight.
    #[serde(default = "default_skew_seconds")]
    pub access_token_skew_seconds: i64,
    /// Total attempts for a version-checked token write before giving up.
    #[serde(default = "default_refresh_retry_attempts")]
    pub refresh_retry_attempts: u32,
}

fn default_frontend_url() -> String {
    "http://localhost:4200".into()
}

fn default_authorize_url() -> String {
    "https://accounts.spotify.com/authorize".into()
}

fn default_token_url() -> String {
    "https://accounts.spotify.com/api/token".into()
}

fn default_api_base_url() -> String {
    "https://api.spotify.com/v1".into()
}

fn default_skew_seconds() -> i64 {
    60
}

fn default_refresh_retry_attempts() -> u32 {
    2
}

/// Application session token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// HMAC secret for signing session tokens.
    pub secret: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_access_ttl_minutes")]
    pub access_ttl_minutes: i64,
    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: i64,
}

fn default_issuer() -> String {
    "overtone".into()
}

fn default_audience() -> String {
    "overtone-client".into()
}

fn default_access_ttl_minutes() -> i64 {
    60
}

fn default_refresh_ttl_days() -> i64 {
    30
}

impl OvertoneConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            OvertoneError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&contents)
            .map_err(|e| OvertoneError::Config(format!("invalid config: {e}")))
    }

    /// Validate that required fields are present and sane.
    pub fn validate(&self) -> Result<()> {
        if self.spotify.client_id.is_empty() {
            return Err(OvertoneError::Config("spotify.client_id is required".into()));
        }
        if self.spotify.client_secret.is_empty() {
            return Err(OvertoneError::Config(
                "spotify.client_secret is required".into(),
            ));
        }
        if self.spotify.redirect_uri.is_empty() {
            return Err(OvertoneError::Config(
                "spotify.redirect_uri is required".into(),
            ));
        }
        if self.session.secret.len() < 32 {
            return Err(OvertoneError::Config(
                "session.secret must be at least 32 characters".into(),
            ));
        }
        if self.spotify.refresh_retry_attempts == 0 {
            return Err(OvertoneError::Config(
                "spotify.refresh_retry_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Path to the token encryption key file inside the data directory.
    pub fn key_file_path(&self) -> std::path::PathBuf {
        Path::new(&self.overtone.data_dir).join("token.key")
    }
}
