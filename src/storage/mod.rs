//! User directory: the user-resolution collaborator of the auth layer.
//!
//! `UserLookup` is all the challenge service needs. `UserRegistry` adds
//! registration for the HTTP surface. Redis is the production backend; the
//! in-memory backend serves tests and local runs.

pub mod memory;
pub mod user;

use crate::models::UserRecord;
use async_trait::async_trait;

pub use memory::MemoryUserDirectory;
pub use user::RedisUserDirectory;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Resolve a public key to the user registered under it.
#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn find_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<UserRecord>, StorageError>;
}

#[async_trait]
pub trait UserRegistry: UserLookup {
    /// Store a new user. Returns `false` if the public key is already taken.
    async fn insert(&self, user: &UserRecord) -> Result<bool, StorageError>;
}
