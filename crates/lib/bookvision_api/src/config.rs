//! API server configuration.
//!
//! Built once at startup and shared read-only through [`crate::AppState`].

use std::str::FromStr;

use bookvision_core::auth::TokenConfig;
use thiserror::Error;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Configuration errors, fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid token configuration: {0}")]
    Token(#[from] bookvision_core::auth::AuthError),

    #[error("unknown username change policy '{0}' (expected 'unique' or 'locked')")]
    UsernamePolicy(String),
}

/// How `UpdateProfile` treats a changed username.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UsernameChangePolicy {
    /// Renames are allowed if the new name is free.
    #[default]
    Unique,
    /// Renames are rejected outright.
    Locked,
}

impl FromStr for UsernameChangePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unique" => Ok(UsernameChangePolicy::Unique),
            "locked" => Ok(UsernameChangePolicy::Locked),
            other => Err(ConfigError::UsernamePolicy(other.to_string())),
        }
    }
}

/// Rules applied by profile updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfilePolicy {
    pub username_changes: UsernameChangePolicy,
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8080").
    pub bind_addr: String,
    /// Token signing secret and lifetime.
    pub token: TokenConfig,
    /// Profile update rules.
    pub profile_policy: ProfilePolicy,
}

impl ApiConfig {
    /// Validates and assembles the configuration.
    pub fn new(
        bind_addr: impl Into<String>,
        jwt_secret: impl Into<String>,
        token_lifetime_hours: i64,
        username_changes: UsernameChangePolicy,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: bind_addr.into(),
            token: TokenConfig::new(jwt_secret, token_lifetime_hours)?,
            profile_policy: ProfilePolicy { username_changes },
        })
    }
}
