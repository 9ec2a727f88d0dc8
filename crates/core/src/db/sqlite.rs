use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::{OvertoneError, Result};
use crate::models::{account::SpotifyAccount, user::AppUser};

use super::repository::{
    OvertoneRepository, SpotifyAccountRepository, UpdateOutcome, UserRepository,
};

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl OvertoneRepository for SqliteRepository {}

// -- Helper functions for parsing DB values --

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn datetime_to_str(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn row_to_account(r: &sqlx::sqlite::SqliteRow) -> SpotifyAccount {
    SpotifyAccount {
        id: r.get("id"),
        user_id: r.get("user_id"),
        spotify_user_id: r.get("spotify_user_id"),
        refresh_token_ciphertext: r.get("refresh_token_ciphertext"),
        refresh_token_key_id: r.get("refresh_token_key_id"),
        access_token_ciphertext: r.get("access_token_ciphertext"),
        access_token_expires_at: r
            .get::<Option<String>, _>("access_token_expires_at")
            .map(|s| parse_datetime(&s)),
        scope: r.get("scope"),
        token_type: r.get("token_type"),
        revoked: r.get("revoked"),
        created_at: parse_datetime(r.get("created_at")),
        updated_at: parse_datetime(r.get("updated_at")),
        row_version: r.get::<i64, _>("row_version"),
    }
}

/// Surface a unique violation on the Spotify account binding as its own error
/// kind; everything else stays a database error.
fn map_account_write_error(e: sqlx::Error) -> OvertoneError {
    if let sqlx::Error::Database(ref db) = e {
        if db.message().contains("spotify_accounts.spotify_user_id") {
            return OvertoneError::DuplicateProviderAccount;
        }
    }
    OvertoneError::Database(e)
}

const ACCOUNT_COLUMNS: &str = "id, user_id, spotify_user_id, refresh_token_ciphertext, \
     refresh_token_key_id, access_token_ciphertext, access_token_expires_at, scope, \
     token_type, revoked, created_at, updated_at, row_version";

#[async_trait]
impl SpotifyAccountRepository for SqliteRepository {
    async fn find_active(&self, user_id: &str) -> Result<Option<SpotifyAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM spotify_accounts WHERE user_id = ?1 AND revoked = 0"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_account))
    }

    async fn find_any(&self, user_id: &str) -> Result<Option<SpotifyAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM spotify_accounts WHERE user_id = ?1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_account))
    }

    async fn find_by_spotify_user_id(
        &self,
        spotify_user_id: &str,
    ) -> Result<Option<SpotifyAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM spotify_accounts WHERE spotify_user_id = ?1"
        ))
        .bind(spotify_user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_account))
    }

    async fn insert(&self, account: &SpotifyAccount) -> Result<()> {
        sqlx::query(
            "INSERT INTO spotify_accounts (id, user_id, spotify_user_id, refresh_token_ciphertext, refresh_token_key_id, access_token_ciphertext, access_token_expires_at, scope, token_type, revoked, created_at, updated_at, row_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        )
        .bind(&account.id)
        .bind(&account.user_id)
        .bind(&account.spotify_user_id)
        .bind(&account.refresh_token_ciphertext)
        .bind(&account.refresh_token_key_id)
        .bind(&account.access_token_ciphertext)
        .bind(account.access_token_expires_at.as_ref().map(datetime_to_str))
        .bind(&account.scope)
        .bind(&account.token_type)
        .bind(account.revoked)
        .bind(datetime_to_str(&account.created_at))
        .bind(datetime_to_str(&account.updated_at))
        .bind(account.row_version)
        .execute(&self.pool)
        .await
        .map_err(map_account_write_error)?;
        Ok(())
    }

    async fn update_with_version_check(
        &self,
        account: &SpotifyAccount,
    ) -> Result<UpdateOutcome> {
        let result = sqlx::query(
            "UPDATE spotify_accounts SET
                spotify_user_id = ?1,
                refresh_token_ciphertext = ?2,
                refresh_token_key_id = ?3,
                access_token_ciphertext = ?4,
                access_token_expires_at = ?5,
                scope = ?6,
                token_type = ?7,
                revoked = ?8,
                updated_at = ?9,
                row_version = row_version + 1
             WHERE id = ?10 AND row_version = ?11",
        )
        .bind(&account.spotify_user_id)
        .bind(&account.refresh_token_ciphertext)
        .bind(&account.refresh_token_key_id)
        .bind(&account.access_token_ciphertext)
        .bind(account.access_token_expires_at.as_ref().map(datetime_to_str))
        .bind(&account.scope)
        .bind(&account.token_type)
        .bind(account.revoked)
        .bind(datetime_to_str(&account.updated_at))
        .bind(&account.id)
        .bind(account.row_version)
        .execute(&self.pool)
        .await
        .map_err(map_account_write_error)?;

        if result.rows_affected() == 0 {
            Ok(UpdateOutcome::Conflict)
        } else {
            Ok(UpdateOutcome::Applied)
        }
    }

    async fn reload(&self, id: &str) -> Result<SpotifyAccount> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM spotify_accounts WHERE id = ?1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row_to_account(&row))
    }
}

#[async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, user: &AppUser) -> Result<()> {
        sqlx::query("INSERT INTO users (id, created_at) VALUES (?1, ?2)")
            .bind(&user.id)
            .bind(datetime_to_str(&user.created_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<AppUser>> {
        let row = sqlx::query("SELECT id, created_at FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| AppUser {
            id: r.get("id"),
            created_at: parse_datetime(r.get("created_at")),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabasePool;
    use chrono::{Duration, TimeZone};

    async fn setup() -> SqliteRepository {
        let pool = DatabasePool::new_sqlite_memory().await.unwrap();
        match pool {
            DatabasePool::Sqlite(p) => SqliteRepository::new(p),
        }
    }

    fn sample_user(id: &str) -> AppUser {
        AppUser {
            id: id.to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    fn sample_account(id: &str, user_id: &str, spotify_user_id: &str) -> SpotifyAccount {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        SpotifyAccount {
            id: id.to_string(),
            user_id: user_id.to_string(),
            spotify_user_id: spotify_user_id.to_string(),
            refresh_token_ciphertext: vec![0xAA, 0xBB],
            refresh_token_key_id: None,
            access_token_ciphertext: Some(vec![0xCC, 0xDD]),
            access_token_expires_at: Some(now + Duration::hours(1)),
            scope: "user-top-read".to_string(),
            token_type: "Bearer".to_string(),
            revoked: false,
            created_at: now,
            updated_at: now,
            row_version: 0,
        }
    }

    async fn seed(repo: &SqliteRepository, user_id: &str, account_id: &str, spotify_id: &str) {
        repo.insert_user(&sample_user(user_id)).await.unwrap();
        repo.insert(&sample_account(account_id, user_id, spotify_id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn insert_and_find_active() {
        let repo = setup().await;
        seed(&repo, "user-001", "acct-001", "spotify-abc").await;

        let found = repo.find_active("user-001").await.unwrap().unwrap();
        assert_eq!(found.id, "acct-001");
        assert_eq!(found.spotify_user_id, "spotify-abc");
        assert_eq!(found.refresh_token_ciphertext, vec![0xAA, 0xBB]);
        assert_eq!(found.row_version, 0);
        assert!(!found.revoked);
    }

    #[tokio::test]
    async fn find_active_excludes_revoked_but_find_any_does_not() {
        let repo = setup().await;
        repo.insert_user(&sample_user("user-001")).await.unwrap();
        let mut account = sample_account("acct-001", "user-001", "spotify-abc");
        account.revoked = true;
        repo.insert(&account).await.unwrap();

        assert!(repo.find_active("user-001").await.unwrap().is_none());
        let any = repo.find_any("user-001").await.unwrap().unwrap();
        assert!(any.revoked);
    }

    #[tokio::test]
    async fn find_by_spotify_user_id() {
        let repo = setup().await;
        seed(&repo, "user-001", "acct-001", "spotify-abc").await;

        let found = repo
            .find_by_spotify_user_id("spotify-abc")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.user_id, "user-001");
        assert!(repo
            .find_by_spotify_user_id("spotify-zzz")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_spotify_user_id_rejected() {
        let repo = setup().await;
        seed(&repo, "user-001", "acct-001", "spotify-abc").await;
        repo.insert_user(&sample_user("user-002")).await.unwrap();

        let result = repo
            .insert(&sample_account("acct-002", "user-002", "spotify-abc"))
            .await;
        assert!(matches!(
            result,
            Err(OvertoneError::DuplicateProviderAccount)
        ));
    }

    #[tokio::test]
    async fn update_increments_row_version() {
        let repo = setup().await;
        seed(&repo, "user-001", "acct-001", "spotify-abc").await;

        let mut account = repo.reload("acct-001").await.unwrap();
        account.scope = "user-read-private".to_string();
        let outcome = repo.update_with_version_check(&account).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Applied);

        let reloaded = repo.reload("acct-001").await.unwrap();
        assert_eq!(reloaded.row_version, 1);
        assert_eq!(reloaded.scope, "user-read-private");
    }

    #[tokio::test]
    async fn stale_version_write_conflicts_without_overwriting() {
        let repo = setup().await;
        seed(&repo, "user-001", "acct-001", "spotify-abc").await;

        let mut first = repo.reload("acct-001").await.unwrap();
        let mut second = first.clone();

        first.scope = "winner".to_string();
        assert_eq!(
            repo.update_with_version_check(&first).await.unwrap(),
            UpdateOutcome::Applied
        );

        second.scope = "loser".to_string();
        assert_eq!(
            repo.update_with_version_check(&second).await.unwrap(),
            UpdateOutcome::Conflict
        );

        let stored = repo.reload("acct-001").await.unwrap();
        assert_eq!(stored.scope, "winner");
        assert_eq!(stored.row_version, 1);
    }

    #[tokio::test]
    async fn reload_missing_row_errors() {
        let repo = setup().await;
        let result = repo.reload("acct-missing").await;
        assert!(matches!(result, Err(OvertoneError::Database(_))));
    }

    #[tokio::test]
    async fn nullable_token_fields_roundtrip() {
        let repo = setup().await;
        repo.insert_user(&sample_user("user-001")).await.unwrap();
        let mut account = sample_account("acct-001", "user-001", "spotify-abc");
        account.access_token_ciphertext = None;
        account.access_token_expires_at = None;
        repo.insert(&account).await.unwrap();

        let found = repo.find_active("user-001").await.unwrap().unwrap();
        assert!(found.access_token_ciphertext.is_none());
        assert!(found.access_token_expires_at.is_none());
    }

    #[tokio::test]
    async fn users_roundtrip() {
        let repo = setup().await;
        repo.insert_user(&sample_user("user-001")).await.unwrap();

        let user = repo.get_user("user-001").await.unwrap().unwrap();
        assert_eq!(user.id, "user-001");
        assert!(repo.get_user("user-404").await.unwrap().is_none());
    }
}
