//! Authentication domain models.
//!
//! These are internal domain models. The password hash never appears here:
//! it stays inside the credential store implementations.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::roles::Role;

/// Who may see a profile section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    /// Database text representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    /// Parse the database text representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// Domain user, as returned by a credential store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub books_read: i32,
    pub reviews_count: i32,
    pub likes_received: i32,
    pub profile_visibility: Visibility,
    pub activity_visibility: Visibility,
}

impl User {
    /// Public view of this user.
    pub fn to_public(&self) -> PublicUser {
        PublicUser::from(self)
    }
}

/// Input for creating a user. The store hashes `password` and discards it.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// User view safe to hand to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub books_read: i32,
    pub reviews_count: i32,
    pub likes_received: i32,
    pub profile_visibility: Visibility,
    pub activity_visibility: Visibility,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            username: u.username.clone(),
            email: u.email.clone(),
            avatar_url: u.avatar_url.clone(),
            role: u.role,
            created_at: u.created_at,
            books_read: u.books_read,
            reviews_count: u.reviews_count,
            likes_received: u.likes_received,
            profile_visibility: u.profile_visibility,
            activity_visibility: u.activity_visibility,
        }
    }
}

/// Issuer written into (and required of) every token.
pub const TOKEN_ISSUER: &str = "bookVisionGo";

/// JWT claims embedded in identity tokens.
///
/// Invariants: `sub == user_id` and `exp > iat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    /// Issuer, always [`TOKEN_ISSUER`].
    pub iss: String,
    /// Subject: user ID (standard JWT `sub` claim).
    pub sub: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Not before (unix timestamp).
    pub nbf: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

impl TokenClaims {
    pub fn issued_at(&self) -> DateTime<Utc> {
        timestamp(self.iat)
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        timestamp(self.nbf)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        timestamp(self.exp)
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}
