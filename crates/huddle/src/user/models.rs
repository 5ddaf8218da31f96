//! User data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User record from the database.
///
/// A removed account keeps its row (so history still resolves its login)
/// but has an empty password and public key.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub login: String,
    /// bcrypt hash, empty for removed accounts.
    pub password: String,
    pub public_key: String,
}

impl User {
    /// Whether the account can log in and receive messages.
    pub fn is_active(&self) -> bool {
        !self.password.is_empty() && !self.public_key.is_empty()
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            login: self.login.clone(),
            public_key: self.public_key.clone(),
        }
    }
}

/// Public view of a user, as shown to other users.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub login: String,
    pub public_key: String,
}

/// Caller identity; all fields are null when not logged in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub id: Option<String>,
    pub login: Option<String>,
    pub public_key: Option<String>,
}

impl From<UserProfile> for UserInfo {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: Some(profile.id),
            login: Some(profile.login),
            public_key: Some(profile.public_key),
        }
    }
}

/// Request to create an account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub public_key: String,
}

/// Request to log in. The presented key must match the registered one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub public_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default, rename = "oldPassword")]
    pub old_password: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoveAccountRequest {
    #[serde(default)]
    pub password: String,
}

/// Successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserProfile,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}
