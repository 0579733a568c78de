//! Request and response models for the API.
//!
//! All models use serde for serialization/deserialization.
//! Storage models represent Redis data structures.

use serde::{Deserialize, Serialize};

// ============================================================================
// Auth Models
// ============================================================================

/// Query for an authentication challenge.
#[derive(Debug, Deserialize)]
pub struct ChallengeQuery {
    pub public_key: String, // npub
}

/// Response containing the string to sign.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub session_id: String,
    pub challenge: String,
}

/// Request to verify a signed challenge.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub session_id: String,
    #[serde(alias = "signature_b64")]
    pub signature: String, // base64
}

/// Outcome of a verification attempt. `token` is the session id on success.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub authenticated: bool,
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

// ============================================================================
// User Models
// ============================================================================

/// Request to register a user record.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub nostr_public_key: String,
    pub lightning_address: Option<String>,
    /// Hex seed used by legacy clients to sign challenges.
    pub raw_seed: Option<String>,
}

/// User info returned to clients. Never carries the seed.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub nostr_public_key: String,
    pub lightning_address: Option<String>,
    pub created_at: u64,
}

impl From<UserRecord> for UserInfo {
    fn from(user: UserRecord) -> Self {
        UserInfo {
            id: user.id,
            nostr_public_key: user.nostr_public_key,
            lightning_address: user.lightning_address,
            created_at: user.created_at,
        }
    }
}

// ============================================================================
// Storage Models
// ============================================================================

/// User data as stored in the user directory.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub nostr_public_key: String,
    #[serde(default)]
    pub lightning_address: Option<String>,
    #[serde(default)]
    pub raw_seed: Option<String>, // hex
    pub created_at: u64,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("nostr_public_key", &self.nostr_public_key)
            .field("lightning_address", &self.lightning_address)
            .field("raw_seed", &self.raw_seed.as_ref().map(|_| "[REDACTED]"))
            .field("created_at", &self.created_at)
            .finish()
    }
}
