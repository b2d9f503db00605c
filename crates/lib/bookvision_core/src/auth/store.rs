//! Credential store contract.
//!
//! The store owns user records and everything to do with passwords. Plaintext
//! goes in through [`CredentialStore::create`] and
//! [`CredentialStore::verify_password`]; hashes never come out.

use async_trait::async_trait;

use super::AuthError;
use crate::models::auth::{NewUser, User};

/// System of record for user identity and password verification.
///
/// Implementations must enforce username uniqueness themselves: two
/// concurrent `create` calls for one username yield exactly one success and
/// one [`AuthError::Conflict`].
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Hash the password and persist a new user.
    ///
    /// Errors: `Conflict` if the username is taken, `Unavailable` on backend
    /// failure.
    async fn create(&self, new_user: NewUser) -> Result<User, AuthError>;

    /// Errors: `NotFound` if no user has this id.
    async fn get_by_id(&self, id: &str) -> Result<User, AuthError>;

    /// Errors: `NotFound` if no user has this username.
    async fn get_by_username(&self, username: &str) -> Result<User, AuthError>;

    /// Persist the mutable fields of `user` (username, avatar, role,
    /// visibility, counters). Never alters id or creation time.
    ///
    /// Errors: `NotFound`, `Conflict` (username taken), `Unavailable`.
    async fn update(&self, user: &User) -> Result<User, AuthError>;

    /// Check a plaintext password.
    ///
    /// Errors: `NotFound` for an unknown username, `InvalidCredentials` for a
    /// wrong password.
    async fn verify_password(&self, username: &str, password: &str) -> Result<User, AuthError>;

    /// Cheap liveness check of the backend.
    async fn ping(&self) -> Result<(), AuthError>;
}
