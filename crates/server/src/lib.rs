//! Overtone Server — HTTP API for Spotify authentication and listening stats.
//!
//! The browser client talks to this API with HTTP-only session cookies; all
//! Spotify traffic happens server-side through the token lifecycle manager.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use overtone_core::config::OvertoneConfig;
use overtone_core::crypto::SecretProtector;
use overtone_core::db::sqlite::SqliteRepository;
use overtone_core::spotify::auth::SpotifyAuthClient;
use overtone_core::spotify::client::SpotifyClient;
use overtone_core::spotify::tokens::TokenService;

pub mod error;
pub mod routes;
pub mod session;

/// Shared application state for all routes.
pub struct AppState {
    pub config: OvertoneConfig,
    pub repo: Arc<SqliteRepository>,
    pub auth: Arc<SpotifyAuthClient>,
    pub tokens: Arc<TokenService<SqliteRepository, SpotifyAuthClient>>,
    pub spotify: SpotifyClient<SqliteRepository, SpotifyAuthClient>,
    pub sessions: session::SessionKeys,
}

impl AppState {
    pub fn new(
        config: OvertoneConfig,
        repo: Arc<SqliteRepository>,
        protector: Arc<dyn SecretProtector>,
    ) -> Self {
        let auth = Arc::new(SpotifyAuthClient::new(&config.spotify));
        let tokens = Arc::new(TokenService::new(
            repo.clone(),
            auth.clone(),
            protector,
            &config.spotify,
        ));
        let spotify = SpotifyClient::new(&config.spotify, tokens.clone());
        let sessions = session::SessionKeys::new(&config.session);
        Self {
            config,
            repo,
            auth,
            tokens,
            spotify,
            sessions,
        }
    }
}

/// Build the API router with all routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/login", get(routes::auth::login))
        .route("/api/auth/callback", get(routes::auth::callback))
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/auth/refresh", post(routes::auth::refresh))
        .route("/api/spotify/me", get(routes::spotify::me))
        .route("/api/spotify/top/tracks", get(routes::spotify::top_tracks))
        .route("/api/spotify/top/artists", get(routes::spotify::top_artists))
        .route(
            "/api/spotify/recently-played",
            get(routes::spotify::recently_played),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
