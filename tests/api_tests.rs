//! HTTP-level tests driving the full router with in-process requests.

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{self, Request, StatusCode};
use common::{TEST_SIGNING_KEY, test_config};
use keygate::create_app;
use keygate::db::{Database, User, UserRole};
use keygate::jwt::TokenCodec;
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt;

/// Mint an access token with the admin role, signed with the test key.
fn admin_token(id: i64, username: &str) -> String {
    let codec = TokenCodec::new(TEST_SIGNING_KEY);
    let user = User {
        id,
        username: username.to_string(),
        email: format!("{}@x.com", username),
        password_hash: String::new(),
        role: UserRole::Admin,
        created_at: String::new(),
        updated_at: String::new(),
    };
    codec
        .issue_access_token(&user, Duration::from_secs(120))
        .unwrap()
}

async fn setup() -> (Router, Database) {
    let config = test_config().await;
    let db = config.db.clone();
    (create_app(&config), db)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_json_bearer(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(http::header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn sign_up(app: &Router, username: &str, email: &str, password: &str) -> Value {
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/signup",
            json!({ "username": username, "email": email, "password": password }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn sign_in(app: &Router, email: &str, password: &str) -> Value {
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/signin",
            json!({ "email": email, "password": password }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn test_signup_returns_id() {
    let (app, _db) = setup().await;

    let body = sign_up(&app, "alice", "a@x.com", "pw1").await;
    assert_eq!(body["id"], 1);
}

#[tokio::test]
async fn test_signup_duplicate_email_is_bad_request() {
    let (app, _db) = setup().await;

    sign_up(&app, "alice", "a@x.com", "pw1").await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/signup",
            json!({ "username": "alice2", "email": "a@x.com", "password": "pw2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_rejects_empty_fields() {
    let (app, _db) = setup().await;

    for payload in [
        json!({ "username": "", "email": "a@x.com", "password": "pw" }),
        json!({ "username": "alice", "email": "not-an-email", "password": "pw" }),
        json!({ "username": "alice", "email": "a@x.com", "password": "" }),
    ] {
        let response = app
            .clone()
            .oneshot(post_json("/api/auth/signup", payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_signin_returns_token_pair() {
    let (app, _db) = setup().await;

    sign_up(&app, "alice", "a@x.com", "pw1").await;
    let body = sign_in(&app, "a@x.com", "pw1").await;

    assert!(!body["access_token"].as_str().unwrap().is_empty());
    assert!(!body["refresh_token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_signin_wrong_password_is_unauthorized() {
    let (app, _db) = setup().await;

    sign_up(&app, "alice", "a@x.com", "pw1").await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/signin",
            json!({ "email": "a@x.com", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_returns_new_access_token() {
    let (app, _db) = setup().await;

    sign_up(&app, "alice", "a@x.com", "pw1").await;
    let tokens = sign_in(&app, "a@x.com", "pw1").await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/refresh",
            json!({ "refresh_token": tokens["refresh_token"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(!body["access_token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_refresh_unknown_secret_is_not_found() {
    let (app, _db) = setup().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/refresh",
            json!({ "refresh_token": "ffff".repeat(16) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validate_round_trip() {
    let (app, _db) = setup().await;

    sign_up(&app, "alice", "a@x.com", "pw1").await;
    let tokens = sign_in(&app, "a@x.com", "pw1").await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/internal/validate",
            json!({ "access_token": tokens["access_token"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["user_id"], "1");
    assert_eq!(body["role"], "user");
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn test_validate_missing_token_fails_fast() {
    let (app, _db) = setup().await;

    let response = app
        .clone()
        .oneshot(post_json("/api/internal/validate", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_validate_garbage_token_reports_invalid() {
    let (app, _db) = setup().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/internal/validate",
            json!({ "access_token": "garbage" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["valid"], false);
    assert!(!body["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_change_role_requires_bearer_token() {
    let (app, _db) = setup().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/role",
            json!({ "target_id": 1, "new_role": "seller" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_role_rejects_non_admin_actor() {
    let (app, db) = setup().await;

    sign_up(&app, "alice", "a@x.com", "pw1").await;
    sign_up(&app, "bob", "b@x.com", "pw2").await;
    let tokens = sign_in(&app, "a@x.com", "pw1").await;

    let response = app
        .clone()
        .oneshot(post_json_bearer(
            "/api/auth/role",
            tokens["access_token"].as_str().unwrap(),
            json!({ "target_id": 2, "new_role": "seller" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let target = db.users().get_by_id(2).await.unwrap().unwrap();
    assert_eq!(target.role, UserRole::User);
}

#[tokio::test]
async fn test_change_role_by_admin_actor() {
    let (app, db) = setup().await;

    sign_up(&app, "alice", "a@x.com", "pw1").await;
    sign_up(&app, "bob", "b@x.com", "pw2").await;

    let response = app
        .clone()
        .oneshot(post_json_bearer(
            "/api/auth/role",
            &admin_token(1, "alice"),
            json!({ "target_id": 2, "new_role": "seller" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let target = db.users().get_by_id(2).await.unwrap().unwrap();
    assert_eq!(target.role, UserRole::Seller);
}

#[tokio::test]
async fn test_change_role_rejects_unknown_role() {
    let (app, _db) = setup().await;

    sign_up(&app, "alice", "a@x.com", "pw1").await;

    let response = app
        .clone()
        .oneshot(post_json_bearer(
            "/api/auth/role",
            &admin_token(1, "alice"),
            json!({ "target_id": 1, "new_role": "superuser" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
