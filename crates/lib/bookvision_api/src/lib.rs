//! # bookvision_api
//!
//! HTTP auth API library for BookVision.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use bookvision_core::auth::{CredentialStore, TokenService};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, health};
use crate::services::auth::AuthService;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Auth orchestrator over the configured credential store.
    pub auth: AuthService,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn CredentialStore>, config: ApiConfig) -> Self {
        let tokens = TokenService::new(&config.token);
        Self::with_tokens(store, tokens, config)
    }

    /// Like [`AppState::new`] with a caller-built token service (e.g. one
    /// reading a fixed clock).
    pub fn with_tokens(
        store: Arc<dyn CredentialStore>,
        tokens: TokenService,
        config: ApiConfig,
    ) -> Self {
        Self {
            auth: AuthService::new(store, tokens, config.profile_policy),
            config,
        }
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/auth/register", post(auth::register_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/refresh", post(auth::refresh_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(
            "/api/auth/profile",
            get(auth::profile_handler).put(auth::update_profile_handler),
        )
        .route("/api/auth/logout", post(auth::logout_handler))
        .route("/api/users/me", get(auth::me_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
