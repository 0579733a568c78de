//! Auth API endpoints.

use crate::auth::middleware::{AppState, SessionToken};
use crate::error::AppError;
use crate::models::{
    ChallengeQuery, ChallengeResponse, ValidateResponse, VerifyRequest, VerifyResponse,
};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use base64::{engine::general_purpose, Engine as _};

/// GET /auth/challenge?public_key=npub1...: Open a session and return its challenge
pub async fn request_challenge(
    State(state): State<AppState>,
    Query(query): Query<ChallengeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (session_id, challenge) = state
        .service
        .issue_challenge(query.public_key.trim())
        .await?;

    Ok(Json(ChallengeResponse {
        session_id,
        challenge,
    }))
}

/// POST /auth/verify: Verify a signed challenge
///
/// Every failure yields the same `{authenticated: false, token: null}` body.
pub async fn verify_challenge(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> impl IntoResponse {
    let req = match body {
        Ok(Json(req)) => req,
        Err(e) => {
            tracing::debug!(action = "verify_rejected", error = %e, "Malformed verify request");
            return Json(VerifyResponse {
                authenticated: false,
                token: None,
            });
        }
    };

    let authenticated = match general_purpose::STANDARD.decode(req.signature.trim()) {
        Ok(signature) => {
            state
                .service
                .verify_signature(&req.session_id, &signature)
                .await
        }
        Err(e) => {
            tracing::debug!(action = "verify_rejected", error = %e, "Signature is not valid base64");
            false
        }
    };

    Json(VerifyResponse {
        authenticated,
        token: authenticated.then_some(req.session_id),
    })
}

/// GET /auth/validate: Check that a session token is verified and unexpired
pub async fn validate_session(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<impl IntoResponse, AppError> {
    if !state.service.is_session_valid(&token) {
        return Err(AppError::Unauthorized(
            "Invalid or expired session".to_string(),
        ));
    }

    Ok(Json(ValidateResponse { valid: true }))
}

/// POST /auth/logout: Invalidate the current session
pub async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<impl IntoResponse, AppError> {
    if !state.service.is_session_valid(&token) {
        return Err(AppError::Unauthorized(
            "Invalid or expired session".to_string(),
        ));
    }

    state.service.revoke_session(&token);
    tracing::info!(action = "logout", "Session revoked");

    Ok(StatusCode::NO_CONTENT)
}
