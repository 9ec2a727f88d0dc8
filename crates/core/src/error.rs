//! Error types for the Overtone core crate.

use thiserror::Error;

/// Top-level error type for all Overtone core operations.
#[derive(Debug, Error)]
pub enum OvertoneError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("secret protection error: {0}")]
    Protection(String),

    #[error("Spotify token endpoint returned {status}: {body}")]
    AuthExchange { status: u16, body: String },

    #[error("Spotify API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Spotify account not connected")]
    NotConnected,

    #[error("Spotify authorization must be renewed")]
    ReauthorizationRequired,

    #[error("token refresh retries exhausted")]
    RefreshRaceExhausted,

    #[error("Spotify account already linked to another user")]
    DuplicateProviderAccount,

    #[error("authentication error: {0}")]
    Auth(String),
}

/// A convenience Result alias that defaults to [`OvertoneError`].
pub type Result<T> = std::result::Result<T, OvertoneError>;
