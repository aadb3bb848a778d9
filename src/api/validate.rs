//! Token-verification oracle for other services.
//!
//! This is the sole trust boundary downstream services rely on: a
//! stateless, side-effect-free check that delegates entirely to
//! `SessionService::parse_token`. Callers must check the `valid` field and
//! not only the HTTP status, and are expected to wrap calls in a bounded
//! timeout (single-digit seconds), treating a timeout as transient rather
//! than as "invalid".

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::service::SessionService;

#[derive(Clone)]
pub struct ValidateState {
    pub service: Arc<SessionService>,
}

pub fn router(state: ValidateState) -> Router {
    Router::new()
        .route("/validate", post(validate_token))
        .with_state(state)
}

#[derive(Deserialize)]
struct ValidateRequest {
    #[serde(default)]
    access_token: String,
}

#[derive(Serialize)]
struct ValidateResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn validate_token(
    State(state): State<ValidateState>,
    Json(payload): Json<ValidateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Fast-fail on missing input before any parsing.
    if payload.access_token.is_empty() {
        return Err(ApiError::bad_request("access_token is required"));
    }

    match state.service.parse_token(&payload.access_token) {
        Ok(claims) => Ok((
            StatusCode::OK,
            Json(ValidateResponse {
                valid: true,
                user_id: Some(claims.sub),
                role: Some(claims.role.as_str().to_string()),
                username: Some(claims.username),
                error: None,
            }),
        )),
        Err(_) => Ok((
            StatusCode::UNAUTHORIZED,
            Json(ValidateResponse {
                valid: false,
                user_id: None,
                role: None,
                username: None,
                error: Some("Can't parse token".to_string()),
            }),
        )),
    }
}
