//! JWT token generation, validation and refresh.
//!
//! Tokens are HS256-signed, self-contained and never recorded server-side:
//! validity depends only on the signature, the claims and the current time.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
};
use thiserror::Error;
use tracing::debug;

use super::{AuthError, Role};
use crate::models::auth::{TOKEN_ISSUER, TokenClaims, User};

/// Default token lifetime: 24 hours.
pub const DEFAULT_LIFETIME_HOURS: i64 = 24;

/// Longest accepted token lifetime: one year.
pub const MAX_LIFETIME_HOURS: i64 = 24 * 365;

/// Signing algorithm accepted and produced.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Why a token was rejected. Callers outside the auth core only ever see the
/// generic "invalid token" signal; these reasons are for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("unexpected signing algorithm")]
    UnexpectedAlgorithm,

    #[error("signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::UnexpectedAlgorithm
            }
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotYetValid,
            ErrorKind::InvalidIssuer => TokenError::InvalidClaims("issuer".into()),
            ErrorKind::InvalidSubject => TokenError::InvalidClaims("subject".into()),
            ErrorKind::MissingRequiredClaim(claim) => {
                TokenError::InvalidClaims(format!("missing {claim}"))
            }
            ErrorKind::Json(err) => TokenError::InvalidClaims(err.to_string()),
            _ => TokenError::Malformed,
        }
    }
}

/// Source of "now" for issuing and validating tokens.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(at),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut now) = self.now.write() {
            *now = at;
        }
    }

    /// Move forward (or backward, with a negative duration).
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.write() {
            *now += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.read().map(|now| *now).unwrap_or_else(|e| *e.into_inner())
    }
}

/// Token signing configuration, loaded once at startup.
#[derive(Clone)]
pub struct TokenConfig {
    secret: String,
    lifetime: Duration,
}

impl TokenConfig {
    /// Rejects an empty secret and a lifetime outside
    /// `1..=MAX_LIFETIME_HOURS`.
    pub fn new(secret: impl Into<String>, lifetime_hours: i64) -> Result<Self, AuthError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(AuthError::Validation("JWT secret must not be empty".into()));
        }
        if !(1..=MAX_LIFETIME_HOURS).contains(&lifetime_hours) {
            return Err(AuthError::Validation(format!(
                "token lifetime must be between 1 and {MAX_LIFETIME_HOURS} hours, got {lifetime_hours}"
            )));
        }
        let lifetime = Duration::try_hours(lifetime_hours).ok_or_else(|| {
            AuthError::Validation(format!("token lifetime out of range: {lifetime_hours}h"))
        })?;
        Ok(Self { secret, lifetime })
    }

    pub fn lifetime_hours(&self) -> i64 {
        self.lifetime.num_hours()
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("lifetime_hours", &self.lifetime_hours())
            .finish()
    }
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

/// Issues and validates identity tokens.
///
/// Cheap to clone; all state is immutable after construction, so any number
/// of tasks may issue and validate concurrently.
#[derive(Clone)]
pub struct TokenService {
    keys: Arc<Keys>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("lifetime", &self.keys.lifetime)
            .field("clock", &self.keys.clock)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Token service on the wall clock.
    pub fn new(config: &TokenConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Token service reading time from `clock`.
    pub fn with_clock(config: &TokenConfig, clock: Arc<dyn Clock>) -> Self {
        // Time bounds are checked against `clock`, not the library's own
        // wall-clock read, so the library checks are off and leeway is zero.
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(config.secret.as_bytes()),
                decoding: DecodingKey::from_secret(config.secret.as_bytes()),
                validation,
                lifetime: config.lifetime,
                clock,
            }),
        }
    }

    /// Configured token lifetime.
    pub fn lifetime(&self) -> Duration {
        self.keys.lifetime
    }

    /// Current time according to this service's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.keys.clock.now()
    }

    /// Issue a token for `user`, valid from now for the configured lifetime.
    pub fn generate_token(&self, user: &User) -> Result<String, TokenError> {
        let now = self.now();
        let claims = self.claims_for(&user.id, &user.username, user.role, now, None)?;
        self.sign(&claims)
    }

    /// Validate a token and return its embedded claims unchanged.
    pub fn validate_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        // An unparseable header (including unknown algorithms such as "none")
        // is a structural failure, not a claims failure.
        let header = decode_header(token).map_err(|_| TokenError::Malformed)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::UnexpectedAlgorithm);
        }

        let data = decode::<TokenClaims>(token, &self.keys.decoding, &self.keys.validation)
            .map_err(TokenError::from)?;
        let claims = data.claims;

        if claims.sub != claims.user_id {
            return Err(TokenError::InvalidClaims(
                "subject does not match user_id".into(),
            ));
        }
        if claims.exp <= claims.iat {
            return Err(TokenError::InvalidClaims(
                "expiry is not after issue time".into(),
            ));
        }

        let now = self.now().timestamp();
        if now < claims.nbf {
            return Err(TokenError::NotYetValid);
        }
        if now > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Re-issue a still-valid token with fresh time fields.
    ///
    /// Expired tokens are rejected: the holder must log in again. The new
    /// expiry is always strictly later than the old one.
    pub fn refresh_token(&self, token: &str) -> Result<String, TokenError> {
        let old = self.validate_token(token)?;
        let now = self.now();
        let claims =
            self.claims_for(&old.user_id, &old.username, old.role, now, Some(old.exp))?;
        debug!(user_id = %claims.user_id, old_exp = old.exp, new_exp = claims.exp, "token refreshed");
        self.sign(&claims)
    }

    fn claims_for(
        &self,
        user_id: &str,
        username: &str,
        role: Role,
        now: DateTime<Utc>,
        previous_exp: Option<i64>,
    ) -> Result<TokenClaims, TokenError> {
        let iat = now.timestamp();
        let mut exp = now
            .checked_add_signed(self.keys.lifetime)
            .ok_or_else(|| TokenError::Encoding("expiry out of range".into()))?
            .timestamp();
        if let Some(previous) = previous_exp {
            exp = exp.max(previous.saturating_add(1));
        }
        Ok(TokenClaims {
            user_id: user_id.to_string(),
            username: username.to_string(),
            role,
            iss: TOKEN_ISSUER.to_string(),
            sub: user_id.to_string(),
            iat,
            nbf: iat,
            exp,
        })
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        encode(&Header::new(ALGORITHM), claims, &self.keys.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }
}
