//! Integration tests: build the router over an in-memory store and drive the
//! auth flows end to end.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use bookvision_api::config::{ApiConfig, UsernameChangePolicy};
use bookvision_api::{AppState, router};
use bookvision_core::auth::InMemoryCredentialStore;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    let config = ApiConfig::new(
        "127.0.0.1:0",
        "integration-test-secret",
        24,
        UsernameChangePolicy::Unique,
    )
    .expect("config");
    let store = Arc::new(InMemoryCredentialStore::with_bcrypt_cost(4));
    router(AppState::new(store, config))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => req.body(Body::empty()),
    }
    .expect("request");

    let resp = app.clone().oneshot(req).await.expect("response");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse JSON")
    };
    (status, json)
}

async fn register(app: &Router, username: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "pwd123456",
        })),
    )
    .await
}

fn token_of(json: &Value) -> String {
    json["token"].as_str().expect("token").to_string()
}

#[tokio::test]
async fn register_profile_update_round_trip() {
    let app = app();

    let (status, json) = register(&app, "alice").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["user"]["username"], "alice");
    assert_eq!(json["user"]["role"], "user");
    let t1 = token_of(&json);

    let (status, json) = send(&app, "GET", "/api/auth/profile", Some(&t1), None).await;
    assert_eq!(status, StatusCode::OK);
    let user = json["user"].as_object().expect("user object");
    assert_eq!(user["username"], "alice");
    assert!(!user.contains_key("password"));
    assert!(!user.contains_key("password_hash"));

    let (status, json) = send(
        &app,
        "PUT",
        "/api/auth/profile",
        Some(&t1),
        Some(json!({ "avatar_url": "https://cdn.example.com/alice.png" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["avatar_url"], "https://cdn.example.com/alice.png");

    let (status, json) = send(&app, "GET", "/api/auth/profile", Some(&t1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["avatar_url"], "https://cdn.example.com/alice.png");
    assert_eq!(json["user"]["username"], "alice");
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = app();
    assert_eq!(register(&app, "alice").await.0, StatusCode::CREATED);

    let (status, json) = register(&app, "alice").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");
}

#[tokio::test]
async fn invalid_registration_is_bad_request() {
    let app = app();
    let (status, json) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "username": "bo", "email": "bo@example.com", "password": "pwd123456" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn login_failures_look_identical() {
    let app = app();
    register(&app, "alice").await;

    let wrong_password = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "not-the-password" })),
    )
    .await;
    let unknown_user = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "nobody", "password": "pwd123456" })),
    )
    .await;

    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_user);
    assert_eq!(wrong_password.1["message"], "Invalid credentials");
}

#[tokio::test]
async fn login_returns_working_token() {
    let app = app();
    register(&app, "alice").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "pwd123456" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = token_of(&json);

    let (status, json) = send(&app, "GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["username"], "alice");
    assert_eq!(json["role"], "user");
}

#[tokio::test]
async fn logout_does_not_revoke_token() {
    let app = app();
    let (_, json) = register(&app, "alice").await;
    let token = token_of(&json);

    let (status, json) = send(&app, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].is_string());

    // Stateless tokens stay valid until they expire.
    let (status, _) = send(&app, "GET", "/api/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_issues_usable_token() {
    let app = app();
    let (_, json) = register(&app, "alice").await;
    let token = token_of(&json);

    let (status, json) = send(&app, "POST", "/api/auth/refresh", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let refreshed = token_of(&json);
    assert_ne!(refreshed, token);

    let (status, json) = send(&app, "GET", "/api/users/me", Some(&refreshed), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["username"], "alice");
}

#[tokio::test]
async fn refresh_rejects_missing_and_invalid_tokens() {
    let app = app();

    let (status, json) = send(&app, "POST", "/api/auth/refresh", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthenticated");

    let (status, json) = send(&app, "POST", "/api/auth/refresh", Some("a.b.c"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "invalid_token");
}

#[tokio::test]
async fn protected_routes_require_bearer_scheme() {
    let app = app();
    let (_, json) = register(&app, "alice").await;
    let token = token_of(&json);

    let req = Request::builder()
        .uri("/api/auth/profile")
        .header(header::AUTHORIZATION, format!("Token {token}"))
        .body(Body::empty())
        .expect("request");
    let resp = app.clone().oneshot(req).await.expect("response");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/auth/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rename_to_taken_username_conflicts() {
    let app = app();
    let (_, json) = register(&app, "alice").await;
    let alice = token_of(&json);
    register(&app, "bob").await;

    let (status, _) = send(
        &app,
        "PUT",
        "/api/auth/profile",
        Some(&alice),
        Some(json!({ "username": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registration_has_single_winner() {
    let app = app();
    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..10 {
        let app = app.clone();
        tasks.spawn(async move { register(&app, "contested").await.0 });
    }

    let mut statuses = Vec::new();
    while let Some(status) = tasks.join_next().await {
        statuses.push(status.expect("join"));
    }
    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let conflicts = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();
    assert_eq!((created, conflicts), (1, 9));
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app();
    let (status, json) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

async fn post_raw(app: &Router, uri: &str, body: &'static str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request");
    let resp = app.clone().oneshot(req).await.expect("response");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&bytes).expect("error body is JSON"))
}

#[tokio::test]
async fn unreadable_bodies_use_error_format() {
    let app = app();

    let (status, json) = post_raw(&app, "/api/auth/login", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
    assert!(!json["message"].as_str().unwrap().contains("line 1"));

    let (status, json) = post_raw(&app, "/api/auth/login", r#"{"username":"alice"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
    assert!(!json["message"].as_str().unwrap().contains("password"));

    let (status, json) = post_raw(&app, "/api/auth/register", r#"{"username":"alice"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn unreadable_profile_update_uses_error_format() {
    let app = app();
    let (_, json) = register(&app, "alice").await;
    let token = token_of(&json);

    let req = Request::builder()
        .method("PUT")
        .uri("/api/auth/profile")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"role":"overlord"}"#))
        .expect("request");
    let resp = app.clone().oneshot(req).await.expect("response");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json: Value = serde_json::from_slice(&bytes).expect("error body is JSON");
    assert_eq!(json["error"], "validation_error");
}
