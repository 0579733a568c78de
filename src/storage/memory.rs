use super::{StorageError, UserLookup, UserRegistry};
use crate::models::UserRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// User directory kept in process memory, keyed by public key.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserLookup for MemoryUserDirectory {
    async fn find_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.users.read().await.get(public_key).cloned())
    }
}

#[async_trait]
impl UserRegistry for MemoryUserDirectory {
    async fn insert(&self, user: &UserRecord) -> Result<bool, StorageError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.nostr_public_key) {
            return Ok(false);
        }
        users.insert(user.nostr_public_key.clone(), user.clone());
        Ok(true)
    }
}
