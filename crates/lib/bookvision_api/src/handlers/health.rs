use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::AppResult;
use crate::models::HealthResponse;

/// `GET /health`: 200 while the credential store answers.
pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    state.auth.health().await?;
    Ok(Json(HealthResponse {
        status: "ok".into(),
    }))
}
