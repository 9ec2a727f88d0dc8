//! Maps core error kinds onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

use overtone_core::error::OvertoneError;

/// Wrapper that turns an [`OvertoneError`] into an HTTP response.
///
/// Messages sent to the client are fixed per error kind; provider error
/// bodies and internal details only ever reach the log.
pub struct ApiError(pub OvertoneError);

impl From<OvertoneError> for ApiError {
    fn from(e: OvertoneError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            OvertoneError::NotConnected => {
                (StatusCode::UNAUTHORIZED, "Spotify account not connected")
            }
            OvertoneError::ReauthorizationRequired => (
                StatusCode::UNAUTHORIZED,
                "Spotify authorization must be renewed",
            ),
            OvertoneError::Auth(_) => (StatusCode::UNAUTHORIZED, "invalid session"),
            OvertoneError::DuplicateProviderAccount => (
                StatusCode::CONFLICT,
                "Spotify account already linked to another user",
            ),
            OvertoneError::RefreshRaceExhausted => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "token refresh contention, retry shortly",
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
        };

        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        } else {
            warn!(error = %self.0, "request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
