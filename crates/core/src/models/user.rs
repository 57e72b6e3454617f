use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user as persisted in `users.json`.
///
/// The password itself is never stored: only a per-user random salt and the
/// Argon2id digest of the password under that salt, both hex-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: u64,
    pub username: String,
    pub hashed_password: String,
    pub salt: String,
    pub registration_date: DateTime<Utc>,
}

/// Public view of a user, safe to show or log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub user_id: u64,
    pub username: String,
    pub registration_date: DateTime<Utc>,
}

impl User {
    pub fn info(&self) -> UserInfo {
        UserInfo {
            user_id: self.user_id,
            username: self.username.clone(),
            registration_date: self.registration_date,
        }
    }
}
