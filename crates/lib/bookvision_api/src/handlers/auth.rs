//! Authentication and profile request handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use tracing::info;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::{CurrentUser, bearer_token};
use crate::models::{
    AuthResponse, IdentityResponse, LoginRequest, MessageResponse, RegisterRequest,
    TokenResponse, UpdateProfileRequest, UserResponse,
};

/// `POST /api/auth/register`: create an account and log it in.
pub async fn register_handler(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let Json(body) = body?;
    let (user, token) = state.auth.register(body).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

/// `POST /api/auth/login`: authenticate with username + password.
pub async fn login_handler(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let Json(body) = body?;
    let (user, token) = state.auth.login(body).await?;
    Ok(Json(AuthResponse { user, token }))
}

/// `POST /api/auth/refresh`: exchange the Bearer token for a fresh one.
pub async fn refresh_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<TokenResponse>> {
    let token = state.auth.refresh_token(bearer_token(&headers)?)?;
    Ok(Json(TokenResponse { token }))
}

/// `GET /api/auth/profile`
pub async fn profile_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<UserResponse>> {
    let user = state.auth.get_profile(&user.user_id).await?;
    Ok(Json(UserResponse { user }))
}

/// `PUT /api/auth/profile`: partial update of the caller's profile.
pub async fn update_profile_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> AppResult<Json<UserResponse>> {
    let Json(body) = body?;
    let user = state.auth.update_profile(&user.user_id, body).await?;
    Ok(Json(UserResponse { user }))
}

/// `POST /api/auth/logout`
///
/// Tokens are stateless: nothing is revoked, the client discards its copy.
pub async fn logout_handler(CurrentUser(user): CurrentUser) -> Json<MessageResponse> {
    info!(user_id = %user.user_id, "user logged out");
    Json(MessageResponse {
        message: "Logged out successfully".into(),
    })
}

/// `GET /api/users/me`: the identity the request gate attached.
pub async fn me_handler(CurrentUser(user): CurrentUser) -> Json<IdentityResponse> {
    Json(IdentityResponse {
        user_id: user.user_id,
        username: user.username,
        role: user.role,
    })
}
