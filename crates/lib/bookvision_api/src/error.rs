//! Application error types.
//!
//! Every response leaving the API is coerced into one of these kinds. Store
//! and token internals are logged, never echoed back.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bookvision_core::auth::AuthError;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Service unavailable")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error kind.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidCredentials
            | AppError::InvalidToken
            | AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Conflict(_) => "conflict",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::InvalidToken => "invalid_token",
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::Forbidden(_) => "forbidden",
            AppError::Unavailable(_) => "unavailable",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Validation(m)
            | AppError::Conflict(m)
            | AppError::NotFound(m)
            | AppError::Unauthenticated(m)
            | AppError::Forbidden(m) => m.as_str(),
            AppError::InvalidCredentials => "Invalid credentials",
            AppError::InvalidToken => "Invalid or expired token",
            AppError::Unavailable(detail) => {
                warn!(%detail, "backing store unavailable");
                "Service temporarily unavailable"
            }
            AppError::Internal(detail) => {
                error!(%detail, "internal error");
                "Internal server error"
            }
        };
        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message: message.to_string(),
        });
        (self.status(), body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Conflict(msg) => AppError::Conflict(msg),
            AuthError::NotFound(_) => AppError::NotFound("User not found".into()),
            AuthError::InvalidCredentials => AppError::InvalidCredentials,
            AuthError::InvalidToken(_) => AppError::InvalidToken,
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::Unavailable(msg) => AppError::Unavailable(msg),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(detail = %rejection.body_text(), "request body rejected");
        let message = match rejection {
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON",
            JsonRejection::JsonDataError(_) => "Request body has missing or invalid fields",
            JsonRejection::MissingJsonContentType(_) => "Expected an application/json request body",
            _ => "Request body could not be read",
        };
        AppError::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use bookvision_core::auth::TokenError;

    use super::*;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn unavailable_hides_detail() {
        let (status, json) =
            body_of(AppError::Unavailable("connection refused to 10.0.0.7:5432".into())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "unavailable");
        assert!(!json["message"].as_str().unwrap().contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn internal_hides_detail() {
        let (status, json) = body_of(AppError::Internal("bcrypt verify: bad cost".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn token_reasons_collapse() {
        let expired = AppError::from(AuthError::InvalidToken(TokenError::Expired));
        let forged = AppError::from(AuthError::InvalidToken(TokenError::BadSignature));
        assert_eq!(body_of(expired).await, body_of(forged).await);
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (AppError::Validation(String::new()), StatusCode::BAD_REQUEST),
            (AppError::Conflict(String::new()), StatusCode::CONFLICT),
            (AppError::NotFound(String::new()), StatusCode::NOT_FOUND),
            (AppError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AppError::InvalidToken, StatusCode::UNAUTHORIZED),
            (AppError::Unauthenticated(String::new()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden(String::new()), StatusCode::FORBIDDEN),
            (AppError::Unavailable(String::new()), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::Internal(String::new()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err:?}");
        }
    }
}
