//! Request gate: Bearer token extraction, verification and role checks.
//!
//! All modes share [`authenticate`]; they differ only in the [`AuthPolicy`]
//! applied when no valid identity can be established.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use bookvision_core::auth::Role;
use bookvision_core::models::auth::TokenClaims;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;
use crate::services::auth::AuthService;

const BEARER_PREFIX: &str = "Bearer ";

/// Identity attached to request extensions once a token has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

impl From<TokenClaims> for AuthenticatedUser {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            role: claims.role,
        }
    }
}

/// What to do when a request carries no usable token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Short-circuit with 401.
    Reject,
    /// Continue without an identity.
    Ignore,
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthenticated("Authorization header required".into()))?;

    header
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthenticated("Invalid authorization header format".into()))
}

/// Resolve the caller's identity from `headers`.
///
/// Under [`AuthPolicy::Ignore`] every failure collapses to `Ok(None)`.
pub fn authenticate(
    headers: &HeaderMap,
    auth: &AuthService,
    policy: AuthPolicy,
) -> Result<Option<AuthenticatedUser>, AppError> {
    let verified = bearer_token(headers).and_then(|token| auth.validate_token(token));
    match (verified, policy) {
        (Ok(claims), _) => Ok(Some(claims.into())),
        (Err(e), AuthPolicy::Reject) => Err(e),
        (Err(e), AuthPolicy::Ignore) => {
            debug!(reason = %e, "continuing without identity");
            Ok(None)
        }
    }
}

/// Middleware: rejects requests without a valid Bearer token and attaches
/// [`AuthenticatedUser`] otherwise.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(user) = authenticate(request.headers(), &state.auth, AuthPolicy::Reject)? {
        request.extensions_mut().insert(user);
    }
    Ok(next.run(request).await)
}

/// Middleware: attaches [`AuthenticatedUser`] when a valid token is present,
/// never rejects.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Ok(Some(user)) = authenticate(request.headers(), &state.auth, AuthPolicy::Ignore) {
        request.extensions_mut().insert(user);
    }
    next.run(request).await
}

/// Middleware: requires an identity attached by [`require_auth`] whose role
/// satisfies `required`.
///
/// ```ignore
/// Router::new()
///     .route("/moderation", get(handler))
///     .layer(from_fn_with_state(Role::Moderator, require_role))
///     .layer(from_fn_with_state(state.clone(), require_auth));
/// ```
pub async fn require_role(
    State(required): State<Role>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| AppError::Unauthenticated("Authentication required".into()))?;

    if !user.role.has_access(required) {
        debug!(user_id = %user.user_id, held = %user.role, %required, "role check failed");
        return Err(AppError::Forbidden("Insufficient permissions".into()));
    }
    Ok(next.run(request).await)
}

/// Extractor for routes behind [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthenticatedUser);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthenticated("Authentication required".into()))
    }
}

/// Extractor for routes behind [`optional_auth`].
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthenticatedUser>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<AuthenticatedUser>().cloned()))
    }
}
