//! User API endpoints.

use crate::auth::keys;
use crate::auth::middleware::{AppState, AuthUser};
use crate::auth::{Clock, SystemClock};
use crate::error::AppError;
use crate::models::{CreateUserRequest, UserInfo, UserRecord};
use crate::storage::UserRegistry;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

/// POST /users: Register a public key
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let nostr_public_key = keys::normalize_public_key(&req.nostr_public_key)
        .map_err(|e| AppError::BadRequest(format!("Invalid public key: {}", e)))?;

    let raw_seed = match req.raw_seed.as_deref().map(str::trim) {
        Some(seed) if !seed.is_empty() => {
            keys::decode_seed_hex(seed)
                .map_err(|e| AppError::BadRequest(format!("Invalid raw seed: {}", e)))?;
            Some(seed.to_ascii_lowercase())
        }
        _ => None,
    };

    let lightning_address = match req.lightning_address.as_deref().map(str::trim) {
        Some(addr) if !addr.is_empty() => {
            if !is_lightning_address(addr) {
                return Err(AppError::BadRequest(
                    "Lightning address must look like name@domain".to_string(),
                ));
            }
            Some(addr.to_string())
        }
        _ => None,
    };

    let user = UserRecord {
        id: nanoid::nanoid!(12),
        nostr_public_key,
        lightning_address,
        raw_seed,
        created_at: SystemClock.now(),
    };

    if !state.users.insert(&user).await? {
        return Err(AppError::Conflict("User already registered".to_string()));
    }

    tracing::info!(action = "user_registered", user_id = %user.id, "New user registered");

    Ok((StatusCode::CREATED, Json(UserInfo::from(user))))
}

/// GET /users/me: The user behind the current session
pub async fn me(auth: AuthUser) -> impl IntoResponse {
    Json(UserInfo::from(auth.user))
}

fn is_lightning_address(addr: &str) -> bool {
    match addr.split_once('@') {
        Some((name, domain)) => {
            !name.is_empty() && domain.contains('.') && !domain.contains('@')
        }
        None => false,
    }
}
