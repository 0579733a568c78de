//! Axum extractors for session tokens and authenticated users.

use super::service::ChallengeService;
use crate::error::AppError;
use crate::models::UserRecord;
use crate::storage::{UserLookup, UserRegistry};
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;
use std::sync::Arc;

/// Header carrying the session token when `Authorization` is not used.
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChallengeService>,
    pub users: Arc<dyn UserRegistry>,
}

/// Bearer session identifier, taken from the first carrier that has one:
/// `Authorization: Bearer {token}`, `x-session-token: {token}`, or the
/// `session-token` query parameter.
///
/// Returns 401 Unauthorized if none is present.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

#[derive(Deserialize)]
struct TokenQuery {
    #[serde(rename = "session-token")]
    session_token: Option<String>,
}

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(auth_header) = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
        {
            let token = auth_header
                .strip_prefix("Bearer ")
                .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".to_string()))?;
            return non_empty(token);
        }

        if let Some(token) = parts
            .headers
            .get(SESSION_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            return non_empty(token);
        }

        if let Ok(Query(TokenQuery {
            session_token: Some(token),
        })) = Query::<TokenQuery>::try_from_uri(&parts.uri)
        {
            return non_empty(&token);
        }

        Err(AppError::Unauthorized("Missing session token".to_string()))
    }
}

fn non_empty(token: &str) -> Result<SessionToken, AppError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::Unauthorized("Missing session token".to_string()));
    }
    Ok(SessionToken(token.to_string()))
}

/// Authenticated user extractor.
///
/// Resolves a verified session to its user record. Returns 401 Unauthorized
/// if the session is missing, expired, or unverified, and 404 Not Found if no
/// user is registered for the session's public key.
pub struct AuthUser {
    pub user: UserRecord,
    pub token: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let SessionToken(token) = SessionToken::from_request_parts(parts, state).await?;

        let public_key = state
            .service
            .public_key_for_session(&token)
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired session".to_string()))?;

        let user = state
            .users
            .find_by_public_key(&public_key)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(AuthUser { user, token })
    }
}
