//! Application user model.

use chrono::{DateTime, Utc};

/// An application user. Identity comes entirely from the linked Spotify
/// account; the app stores no profile data of its own.
#[derive(Debug, Clone)]
pub struct AppUser {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

impl AppUser {
    /// Create a new user with a fresh random id.
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        }
    }
}

impl Default for AppUser {
    fn default() -> Self {
        Self::new()
    }
}
