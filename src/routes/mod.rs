//! API route handlers.

pub mod auth;
pub mod users;

use crate::auth::middleware::AppState;
use axum::{routing::get, routing::post, Router};

/// Build the API router with all endpoints.
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Auth endpoints
        .route("/auth/challenge", get(auth::request_challenge))
        .route("/auth/verify", post(auth::verify_challenge))
        .route("/auth/validate", get(auth::validate_session))
        .route("/auth/logout", post(auth::logout))
        // User endpoints
        .route("/users", post(users::create_user))
        .route("/users/me", get(users::me))
}
