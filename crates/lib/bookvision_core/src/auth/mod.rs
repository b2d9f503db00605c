//! Authentication and authorization logic.
//!
//! Provides the role hierarchy, password hashing, JWT issuance/validation and
//! the credential store contract with its PostgreSQL and in-memory backends.

pub mod jwt;
pub mod memory;
pub mod password;
pub mod queries;
pub mod roles;
pub mod store;

use thiserror::Error;

pub use jwt::{Clock, FixedClock, SystemClock, TokenConfig, TokenError, TokenService};
pub use memory::InMemoryCredentialStore;
pub use queries::PgCredentialStore;
pub use roles::{Role, has_access};
pub use store::CredentialStore;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AuthError::NotFound("row not found".into()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AuthError::Conflict(db.message().to_string())
            }
            _ => AuthError::Unavailable(e.to_string()),
        }
    }
}
