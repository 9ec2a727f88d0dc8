//! Linked Spotify account with encrypted credentials.

use chrono::{DateTime, Duration, Utc};

/// A user's linked Spotify account.
///
/// Token material is stored encrypted; the plaintext only exists transiently
/// inside the token lifecycle manager. `row_version` is bumped by the store
/// on every successful write and is the basis for lost-update detection.
#[derive(Debug, Clone)]
pub struct SpotifyAccount {
    pub id: String,
    pub user_id: String,
    pub spotify_user_id: String,
    pub refresh_token_ciphertext: Vec<u8>,
    pub refresh_token_key_id: Option<String>,
    pub access_token_ciphertext: Option<Vec<u8>>,
    pub access_token_expires_at: Option<DateTime<Utc>>,
    pub scope: String,
    pub token_type: String,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub row_version: i64,
}

impl SpotifyAccount {
    /// Returns the access-token ciphertext if the token is still usable at
    /// `now`, i.e. present and expiring later than `now + skew`.
    pub fn fresh_access_ciphertext(
        &self,
        now: DateTime<Utc>,
        skew: Duration,
    ) -> Option<&[u8]> {
        match (&self.access_token_ciphertext, self.access_token_expires_at) {
            (Some(ciphertext), Some(expires_at)) if expires_at > now + skew => {
                Some(ciphertext.as_slice())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_account() -> SpotifyAccount {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        SpotifyAccount {
            id: "acct-001".to_string(),
            user_id: "user-001".to_string(),
            spotify_user_id: "spotify-abc".to_string(),
            refresh_token_ciphertext: vec![1, 2, 3],
            refresh_token_key_id: None,
            access_token_ciphertext: Some(vec![4, 5, 6]),
            access_token_expires_at: Some(now + Duration::hours(1)),
            scope: "user-top-read".to_string(),
            token_type: "Bearer".to_string(),
            revoked: false,
            created_at: now,
            updated_at: now,
            row_version: 0,
        }
    }

    #[test]
    fn token_well_before_expiry_is_fresh() {
        let account = sample_account();
        let now = account.created_at;
        assert!(account
            .fresh_access_ciphertext(now, Duration::seconds(60))
            .is_some());
    }

    #[test]
    fn token_inside_skew_margin_is_stale() {
        let account = sample_account();
        // 30 seconds of life left, but the margin is 60 seconds.
        let now = account.access_token_expires_at.unwrap() - Duration::seconds(30);
        assert!(account
            .fresh_access_ciphertext(now, Duration::seconds(60))
            .is_none());
    }

    #[test]
    fn expiry_exactly_at_margin_is_stale() {
        let account = sample_account();
        let now = account.access_token_expires_at.unwrap() - Duration::seconds(60);
        assert!(account
            .fresh_access_ciphertext(now, Duration::seconds(60))
            .is_none());
    }

    #[test]
    fn missing_access_token_is_stale() {
        let mut account = sample_account();
        account.access_token_ciphertext = None;
        account.access_token_expires_at = None;
        let now = account.created_at;
        assert!(account
            .fresh_access_ciphertext(now, Duration::seconds(60))
            .is_none());
    }
}
