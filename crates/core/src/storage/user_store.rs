use chrono::Utc;
use std::path::PathBuf;

use tracing::info;

use super::atomic;
use super::credentials::{self, KdfParams};
use crate::errors::CoreError;
use crate::models::settings::Settings;
use crate::models::user::User;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 4;

/// Credential store over `users.json`.
#[derive(Debug, Clone)]
pub struct UserStore {
    path: PathBuf,
    kdf: KdfParams,
}

impl UserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kdf: KdfParams::default(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.users_path())
    }

    /// Override the Argon2 cost parameters (tests use cheap ones).
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn all(&self) -> Result<Vec<User>, CoreError> {
        Ok(atomic::read_json(&self.path, CoreError::Deserialization)?.unwrap_or_default())
    }

    /// Register a new user. Ids are `max(existing) + 1`, starting at 1.
    pub fn create(&self, username: &str, password: &str) -> Result<User, CoreError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(CoreError::Validation("username must not be empty".into()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        // Hash before taking the lock; Argon2 is the slow part.
        let salt = credentials::generate_salt()?;
        let digest = credentials::hash_password(password, &salt, &self.kdf)?;

        let user = atomic::locked(&self.path, || {
            let mut users = self.all()?;
            if users.iter().any(|u| u.username == username) {
                return Err(CoreError::UsernameTaken(username.to_string()));
            }
            let user = User {
                user_id: users.iter().map(|u| u.user_id).max().unwrap_or(0) + 1,
                username: username.to_string(),
                hashed_password: hex::encode(digest),
                salt: hex::encode(salt),
                registration_date: Utc::now(),
            };
            users.push(user.clone());
            atomic::write_json(&self.path, &users)?;
            Ok(user)
        })?;
        info!(user_id = user.user_id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Check a username/password pair and return the stored user.
    pub fn verify(&self, username: &str, password: &str) -> Result<User, CoreError> {
        let username = username.trim();
        let user = self
            .all()?
            .into_iter()
            .find(|u| u.username == username)
            .ok_or_else(|| CoreError::UserNotFound(username.to_string()))?;

        let salt = hex::decode(&user.salt)
            .map_err(|e| CoreError::Deserialization(format!("salt for '{username}': {e}")))?;
        let expected = hex::decode(&user.hashed_password)
            .map_err(|e| CoreError::Deserialization(format!("hash for '{username}': {e}")))?;
        let digest = credentials::hash_password(password, &salt, &self.kdf)?;

        if credentials::constant_time_eq(&digest, &expected) {
            Ok(user)
        } else {
            Err(CoreError::InvalidCredentials)
        }
    }
}
