//! OAuth login flow and application session routes.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header::SET_COOKIE, HeaderMap};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use overtone_core::db::repository::{SpotifyAccountRepository, UserRepository};
use overtone_core::error::{OvertoneError, Result};
use overtone_core::models::user::AppUser;
use overtone_core::spotify::auth::SpotifyAuthApi;
use overtone_core::spotify::scopes;

use crate::error::ApiError;
use crate::session::{
    self, CurrentUser, SessionTokens, ACCESS_COOKIE, REFRESH_COOKIE, STATE_COOKIE,
};
use crate::AppState;

/// Lifetime of the anti-forgery state cookie set before redirecting to
/// Spotify.
const STATE_COOKIE_MAX_AGE_SECS: i64 = 600;

/// Start the authorization-code flow: hand the client the Spotify authorize
/// URL and pin the state parameter in a short-lived cookie.
pub async fn login(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let oauth_state = Uuid::new_v4().simple().to_string();
    let auth_url = state.auth.authorize_url(&oauth_state, scopes::ALL);

    (
        AppendHeaders([(
            SET_COOKIE,
            session::set_cookie(STATE_COOKIE, &oauth_state, STATE_COOKIE_MAX_AGE_SECS),
        )]),
        Json(json!({ "authUrl": auth_url })),
    )
}

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Spotify redirects here after the user grants (or denies) access.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    let frontend = state.config.overtone.frontend_url.clone();

    if let Some(error) = params.error.filter(|e| !e.is_empty()) {
        warn!(error = %error, "Spotify OAuth error on callback");
        return error_redirect(&frontend, &error);
    }

    let Some(expected_state) = session::cookie_value(&headers, STATE_COOKIE) else {
        warn!("callback without a state cookie");
        return error_redirect(&frontend, "Invalid state parameter");
    };
    if params.state.as_deref() != Some(expected_state.as_str()) {
        warn!("callback state parameter does not match the stored state");
        return error_redirect(&frontend, "Invalid state parameter");
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return error_redirect(&frontend, "Authorization code missing");
    };

    match complete_login(&state, &code).await {
        Ok(tokens) => (
            AppendHeaders([
                (SET_COOKIE, session::clear_cookie(STATE_COOKIE)),
                (
                    SET_COOKIE,
                    session::set_cookie(
                        ACCESS_COOKIE,
                        &tokens.access_token,
                        state.config.session.access_ttl_minutes * 60,
                    ),
                ),
                (
                    SET_COOKIE,
                    session::set_cookie(
                        REFRESH_COOKIE,
                        &tokens.refresh_token,
                        state.config.session.refresh_ttl_days * 86_400,
                    ),
                ),
            ]),
            Redirect::to(&format!("{frontend}/dashboard")),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Spotify authentication failed");
            error_redirect(&frontend, "Authentication failed. Please try again.")
        }
    }
}

/// Exchange the code, resolve the application user, persist the tokens, and
/// issue a session.
async fn complete_login(state: &AppState, code: &str) -> Result<SessionTokens> {
    let token_response = state.auth.exchange_code(code).await?;

    let profile = state
        .spotify
        .get_with_token(&token_response.access_token, "/me")
        .await?;
    let spotify_user_id = profile["id"]
        .as_str()
        .ok_or_else(|| OvertoneError::Auth("Spotify profile response missing id".into()))?;

    let user_id = match state.repo.find_by_spotify_user_id(spotify_user_id).await? {
        Some(account) => account.user_id,
        None => {
            let user = AppUser::new();
            state.repo.insert_user(&user).await?;
            info!(user_id = %user.id, spotify_user_id, "created user for new Spotify account");
            user.id
        }
    };

    let refresh_token = token_response.refresh_token.as_deref().ok_or_else(|| {
        OvertoneError::Auth("code exchange response missing refresh_token".into())
    })?;
    state
        .tokens
        .store_tokens(
            &user_id,
            spotify_user_id,
            &token_response.access_token,
            refresh_token,
            token_response.expires_in,
            token_response.scope.as_deref().unwrap_or_default(),
        )
        .await?;

    info!(user_id = %user_id, "user authenticated with Spotify");
    state.sessions.issue_pair(&user_id)
}

fn error_redirect(frontend: &str, message: &str) -> Response {
    Redirect::to(&format!(
        "{frontend}/error?message={}",
        urlencoding::encode(message)
    ))
    .into_response()
}

/// Revoke the Spotify link and drop the session cookies. Idempotent.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> std::result::Result<impl IntoResponse, ApiError> {
    state.tokens.revoke(&user.0).await?;

    Ok((
        AppendHeaders([
            (SET_COOKIE, session::clear_cookie(ACCESS_COOKIE)),
            (SET_COOKIE, session::clear_cookie(REFRESH_COOKIE)),
        ]),
        Json(json!({ "message": "Successfully logged out" })),
    ))
}

/// Rotate the session access token from the refresh-token cookie.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let refresh_token = session::cookie_value(&headers, REFRESH_COOKIE)
        .ok_or_else(|| ApiError(OvertoneError::Auth("no refresh token provided".into())))?;
    let user_id = state.sessions.verify_refresh(&refresh_token)?;
    let (access_token, expires_at) = state.sessions.issue_access(&user_id)?;

    Ok((
        AppendHeaders([(
            SET_COOKIE,
            session::set_cookie(
                ACCESS_COOKIE,
                &access_token,
                state.config.session.access_ttl_minutes * 60,
            ),
        )]),
        Json(json!({
            "message": "Token refreshed successfully",
            "expiresAt": expires_at.to_rfc3339(),
        })),
    ))
}
