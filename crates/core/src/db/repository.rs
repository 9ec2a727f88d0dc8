use async_trait::async_trait;

use crate::error::Result;
use crate::models::{account::SpotifyAccount, user::AppUser};

/// Outcome of a version-checked write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The write landed; the stored row version was incremented.
    Applied,
    /// The stored version no longer matches the one the caller read —
    /// another writer got there first.
    Conflict,
}

#[async_trait]
pub trait SpotifyAccountRepository: Send + Sync {
    /// Find the non-revoked account for a user, if any.
    async fn find_active(&self, user_id: &str) -> Result<Option<SpotifyAccount>>;

    /// Find a user's account regardless of revocation state.
    async fn find_any(&self, user_id: &str) -> Result<Option<SpotifyAccount>>;

    /// Find the account bound to a Spotify-side user id, revoked or not.
    async fn find_by_spotify_user_id(
        &self,
        spotify_user_id: &str,
    ) -> Result<Option<SpotifyAccount>>;

    /// Insert a new account row. A `spotify_user_id` already bound to another
    /// row fails with `DuplicateProviderAccount`.
    async fn insert(&self, account: &SpotifyAccount) -> Result<()>;

    /// Write the account back only if the stored `row_version` still matches
    /// `account.row_version`. Never overwrites a concurrent writer's work.
    async fn update_with_version_check(&self, account: &SpotifyAccount)
        -> Result<UpdateOutcome>;

    /// Re-read an account by primary key. Errors if the row is gone.
    async fn reload(&self, id: &str) -> Result<SpotifyAccount>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert_user(&self, user: &AppUser) -> Result<()>;
    async fn get_user(&self, id: &str) -> Result<Option<AppUser>>;
}

pub trait OvertoneRepository: SpotifyAccountRepository + UserRepository {}
