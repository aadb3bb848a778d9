//! Credential lifecycle API endpoints.
//!
//! - POST `/signup` - Register a new user
//! - POST `/signin` - Exchange email + password for a token pair
//! - POST `/refresh` - Exchange a refresh secret for a new access token
//! - POST `/role` - Change a user's role (admin bearer token required)

use axum::{
    Json, Router,
    extract::{FromRequestParts, State},
    http::{StatusCode, request::Parts},
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::db::UserRole;
use crate::jwt::Claims;
use crate::service::SessionService;

#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<SessionService>,
}

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/signup", post(sign_up))
        .route("/signin", post(sign_in))
        .route("/refresh", post(refresh))
        .route("/role", post(change_role))
        .with_state(state)
}

/// Extractor for the actor's verified identity from `Authorization: Bearer`.
pub struct BearerClaims(pub Claims);

impl FromRequestParts<AuthState> for BearerClaims {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Empty auth header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid auth header"))?;

        if token.is_empty() {
            return Err(ApiError::unauthorized("Token is empty"));
        }

        let claims = state.service.parse_token(token)?;
        Ok(BearerClaims(claims))
    }
}

#[derive(Deserialize)]
struct SignUpRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Serialize)]
struct SignUpResponse {
    id: i64,
}

async fn sign_up(
    State(state): State<AuthState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim();
    let email = payload.email.trim();

    if username.is_empty() {
        return Err(ApiError::bad_request("Username cannot be empty"));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("A valid email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::bad_request("Password cannot be empty"));
    }

    let id = state.service.sign_up(username, email, &payload.password).await?;

    Ok((StatusCode::CREATED, Json(SignUpResponse { id })))
}

#[derive(Deserialize)]
struct SignInRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct SignInResponse {
    access_token: String,
    refresh_token: String,
}

async fn sign_in(
    State(state): State<AuthState>,
    Json(payload): Json<SignInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let tokens = state
        .service
        .sign_in(payload.email.trim(), &payload.password)
        .await?;

    Ok((
        StatusCode::OK,
        Json(SignInResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }),
    ))
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Serialize)]
struct RefreshResponse {
    access_token: String,
}

async fn refresh(
    State(state): State<AuthState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.refresh_token.is_empty() {
        return Err(ApiError::bad_request("refresh_token is required"));
    }

    let access_token = state.service.refresh_tokens(&payload.refresh_token).await?;

    Ok((StatusCode::OK, Json(RefreshResponse { access_token })))
}

#[derive(Deserialize)]
struct ChangeRoleRequest {
    target_id: i64,
    new_role: String,
}

async fn change_role(
    State(state): State<AuthState>,
    BearerClaims(actor): BearerClaims,
    Json(payload): Json<ChangeRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_role = UserRole::parse(&payload.new_role)
        .ok_or_else(|| ApiError::bad_request("Unknown role"))?;

    state
        .service
        .change_role(&actor, payload.target_id, new_role)
        .await?;

    Ok((StatusCode::OK, Json(serde_json::json!({}))))
}
