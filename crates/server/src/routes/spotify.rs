//! Listening-stats endpoints backed by the Spotify API facade.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::session::CurrentUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    #[serde(default = "default_time_range")]
    pub time_range: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_time_range() -> String {
    "medium_term".to_string()
}

fn default_limit() -> u32 {
    20
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.spotify.get_me(&user.0).await?))
}

pub async fn top_tracks(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<TopQuery>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(
        state
            .spotify
            .get_top_tracks(&user.0, &query.time_range, query.limit)
            .await?,
    ))
}

pub async fn top_artists(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<TopQuery>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(
        state
            .spotify
            .get_top_artists(&user.0, &query.time_range, query.limit)
            .await?,
    ))
}

pub async fn recently_played(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(
        state.spotify.get_recently_played(&user.0, query.limit).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_query_defaults() {
        let query: TopQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.time_range, "medium_term");
        assert_eq!(query.limit, 20);
    }

    #[test]
    fn top_query_overrides() {
        let query: TopQuery =
            serde_json::from_str(r#"{"time_range": "short_term", "limit": 5}"#).unwrap();
        assert_eq!(query.time_range, "short_term");
        assert_eq!(query.limit, 5);
    }
}
