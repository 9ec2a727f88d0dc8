//! Token lifecycle management for linked Spotify accounts.
//!
//! Answers "give me a currently valid access token for this user", refreshing
//! on demand. Concurrent refreshes coordinate through the store's
//! version-checked write rather than an in-process lock, so the protocol also
//! holds across processes sharing one database: the loser of a write race
//! reloads and normally finds the winner's fresh token without making a
//! second call to Spotify.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::SpotifyConfig;
use crate::crypto::SecretProtector;
use crate::db::repository::{SpotifyAccountRepository, UpdateOutcome};
use crate::error::{OvertoneError, Result};
use crate::models::account::SpotifyAccount;

use super::auth::SpotifyAuthApi;

pub struct TokenService<R, A> {
    repo: Arc<R>,
    auth: Arc<A>,
    protector: Arc<dyn SecretProtector>,
    clock: Arc<dyn Clock>,
    skew: Duration,
    retry_attempts: u32,
}

impl<R, A> TokenService<R, A>
where
    R: SpotifyAccountRepository,
    A: SpotifyAuthApi,
{
    pub fn new(
        repo: Arc<R>,
        auth: Arc<A>,
        protector: Arc<dyn SecretProtector>,
        config: &SpotifyConfig,
    ) -> Self {
        Self::with_clock(repo, auth, protector, config, Arc::new(SystemClock))
    }

    /// Create a service with a custom time source (useful for testing).
    pub fn with_clock(
        repo: Arc<R>,
        auth: Arc<A>,
        protector: Arc<dyn SecretProtector>,
        config: &SpotifyConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            auth,
            protector,
            clock,
            skew: Duration::seconds(config.access_token_skew_seconds),
            retry_attempts: config.refresh_retry_attempts,
        }
    }

    /// Return a currently valid plaintext access token for the user.
    ///
    /// A fresh stored token is decrypted and returned with no network call
    /// and no write. A stale one enters the refresh protocol.
    pub async fn get_valid_access_token(&self, user_id: &str) -> Result<String> {
        let account = self
            .repo
            .find_active(user_id)
            .await?
            .ok_or(OvertoneError::NotConnected)?;

        if let Some(ciphertext) = account.fresh_access_ciphertext(self.clock.now(), self.skew) {
            return self.protector.unprotect(ciphertext);
        }

        self.refresh_and_return(account).await
    }

    /// Refresh protocol: reload, re-check freshness, refresh against Spotify,
    /// write back with a version check, and retry the whole sequence on a
    /// lost race, up to the configured bound.
    async fn refresh_and_return(&self, account: SpotifyAccount) -> Result<String> {
        let account_id = account.id.clone();

        for attempt in 0..self.retry_attempts {
            // A competing caller may have refreshed between our read and now.
            let mut account = self.repo.reload(&account_id).await?;
            if let Some(ciphertext) = account.fresh_access_ciphertext(self.clock.now(), self.skew)
            {
                debug!(user_id = %account.user_id, "token already refreshed by another caller");
                return self.protector.unprotect(ciphertext);
            }

            let refresh_token = self
                .protector
                .unprotect(&account.refresh_token_ciphertext)?;
            let refreshed = match self.auth.refresh(&refresh_token).await {
                Ok(response) => response,
                Err(OvertoneError::AuthExchange { status, body }) => {
                    warn!(
                        user_id = %account.user_id,
                        status,
                        body = %body,
                        "Spotify rejected the refresh token, user must re-authorize"
                    );
                    return Err(OvertoneError::ReauthorizationRequired);
                }
                Err(e) => return Err(e),
            };

            // Refresh responses may omit the refresh token. Keep the stored
            // one in that case.
            if let Some(new_refresh) = refreshed
                .refresh_token
                .as_deref()
                .filter(|t| !t.trim().is_empty())
            {
                account.refresh_token_ciphertext = self.protector.protect(new_refresh)?;
            }

            let now = self.clock.now();
            account.access_token_ciphertext =
                Some(self.protector.protect(&refreshed.access_token)?);
            account.access_token_expires_at =
                Some(now + Duration::seconds(refreshed.expires_in) - self.skew);
            account.token_type = refreshed.token_type.clone();
            if let Some(scope) = &refreshed.scope {
                account.scope = scope.clone();
            }
            account.updated_at = now;

            match self.repo.update_with_version_check(&account).await? {
                UpdateOutcome::Applied => return Ok(refreshed.access_token),
                UpdateOutcome::Conflict => {
                    debug!(
                        user_id = %account.user_id,
                        attempt,
                        "version conflict while writing refreshed token, retrying"
                    );
                }
            }
        }

        Err(OvertoneError::RefreshRaceExhausted)
    }

    /// Upsert the token pair obtained from a code exchange. Reconnecting
    /// always clears a prior revocation.
    pub async fn store_tokens(
        &self,
        user_id: &str,
        spotify_user_id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_in: i64,
        scope: &str,
    ) -> Result<()> {
        for _attempt in 0..self.retry_attempts {
            let now = self.clock.now();
            let expires_at = now + Duration::seconds(expires_in) - self.skew;

            match self.repo.find_any(user_id).await? {
                None => {
                    let account = SpotifyAccount {
                        id: Uuid::new_v4().to_string(),
                        user_id: user_id.to_string(),
                        spotify_user_id: spotify_user_id.to_string(),
                        refresh_token_ciphertext: self.protector.protect(refresh_token)?,
                        refresh_token_key_id: None,
                        access_token_ciphertext: Some(self.protector.protect(access_token)?),
                        access_token_expires_at: Some(expires_at),
                        scope: scope.to_string(),
                        token_type: "Bearer".to_string(),
                        revoked: false,
                        created_at: now,
                        updated_at: now,
                        row_version: 0,
                    };
                    self.repo.insert(&account).await?;
                    debug!(user_id, spotify_user_id, "linked Spotify account");
                    return Ok(());
                }
                Some(mut account) => {
                    account.spotify_user_id = spotify_user_id.to_string();
                    account.refresh_token_ciphertext = self.protector.protect(refresh_token)?;
                    account.access_token_ciphertext =
                        Some(self.protector.protect(access_token)?);
                    account.access_token_expires_at = Some(expires_at);
                    account.scope = scope.to_string();
                    account.revoked = false;
                    account.updated_at = now;

                    match self.repo.update_with_version_check(&account).await? {
                        UpdateOutcome::Applied => {
                            debug!(user_id, spotify_user_id, "re-linked Spotify account");
                            return Ok(());
                        }
                        UpdateOutcome::Conflict => {
                            debug!(user_id, "version conflict while storing tokens, retrying");
                        }
                    }
                }
            }
        }

        Err(OvertoneError::RefreshRaceExhausted)
    }

    /// Mark the user's account revoked. A user with no account is a no-op.
    pub async fn revoke(&self, user_id: &str) -> Result<()> {
        for _attempt in 0..self.retry_attempts {
            let Some(mut account) = self.repo.find_any(user_id).await? else {
                return Ok(());
            };
            if account.revoked {
                return Ok(());
            }

            account.revoked = true;
            account.updated_at = self.clock.now();

            match self.repo.update_with_version_check(&account).await? {
                UpdateOutcome::Applied => {
                    debug!(user_id, "revoked Spotify account");
                    return Ok(());
                }
                UpdateOutcome::Conflict => {
                    debug!(user_id, "version conflict while revoking, retrying");
                }
            }
        }

        Err(OvertoneError::RefreshRaceExhausted)
    }
}
