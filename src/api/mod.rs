mod auth;
mod error;
mod validate;

use axum::Router;
use std::sync::Arc;

use crate::service::SessionService;

pub use auth::BearerClaims;

/// Create the API router.
///
/// The credential lifecycle lives under `/auth` and the token-verification
/// oracle for other services under `/internal`.
pub fn create_api_router(service: Arc<SessionService>) -> Router {
    let auth_state = auth::AuthState {
        service: service.clone(),
    };

    let validate_state = validate::ValidateState { service };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/internal", validate::router(validate_state))
}
