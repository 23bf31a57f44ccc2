use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sign-in method recorded at account creation, derived from the identity
/// provider's metadata inside the verified ID token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Google,
    Facebook,
    Email,
    Other,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Google => "google",
            AuthProvider::Facebook => "facebook",
            AuthProvider::Email => "email",
            AuthProvider::Other => "other",
        }
    }

    /// Parse a stored provider string. Unrecognized values map to `Other`.
    pub fn parse(s: &str) -> Self {
        match s {
            "google" => AuthProvider::Google,
            "facebook" => AuthProvider::Facebook,
            "email" => AuthProvider::Email,
            _ => AuthProvider::Other,
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account lifecycle status. Session validation refuses inactive users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Inactive => "INACTIVE",
        }
    }

    /// Parse a stored status string. Unknown values are treated as inactive.
    pub fn parse(s: &str) -> Self {
        match s {
            "ACTIVE" => UserStatus::Active,
            _ => UserStatus::Inactive,
        }
    }
}

/// User record, created on first successful verified login.
///
/// `firebase_uid` is the provider's stable subject id and the join key
/// between external identity and local account; it never changes once set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
    pub firebase_uid: String,
    pub provider: AuthProvider,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}
