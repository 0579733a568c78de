//! User Redis operations.
//!
//! Redis key patterns:
//! - `user:{nanoid}`: individual user data (JSON)
//! - `pubkey:{npub}`: public key lookup to user_id (STRING)
//!
//! ## Security: Zeroizing Sensitive Data
//!
//! User records may carry a legacy signing seed, so the JSON read back from
//! Redis is wrapped in `Zeroizing` and cleared once deserialized.

use super::{StorageError, UserLookup, UserRegistry};
use crate::models::UserRecord;
use async_trait::async_trait;
use redis::AsyncCommands;
use zeroize::Zeroizing;

/// Store a user and claim its public key.
///
/// Returns `false` without writing anything if the public key already maps to
/// a user.
pub async fn store_user<C>(con: &mut C, user: &UserRecord) -> Result<bool, StorageError>
where
    C: AsyncCommands,
{
    let user_key = format!("user:{}", user.id);
    let pubkey_key = format!("pubkey:{}", user.nostr_public_key);

    let json = Zeroizing::new(serde_json::to_string(user)?);

    // Claim the public key first so two registrations cannot both win
    let claimed: bool = con.set_nx(&pubkey_key, &user.id).await?;
    if !claimed {
        return Ok(false);
    }

    if let Err(e) = con.set::<_, _, ()>(&user_key, json.as_str()).await {
        // Release the claim so the key can be registered again
        let _: Result<(), _> = con.del(&pubkey_key).await;
        return Err(e.into());
    }

    Ok(true)
}

/// Get a user by ID.
///
/// The user JSON is zeroized after deserialization.
pub async fn get_user<C>(con: &mut C, id: &str) -> Result<Option<UserRecord>, StorageError>
where
    C: AsyncCommands,
{
    let key = format!("user:{}", id);
    let json: Option<String> = con.get(&key).await?;

    match json {
        Some(data) => {
            let zeroizing_data = Zeroizing::new(data);
            let user = serde_json::from_str(&zeroizing_data)?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

/// Get a user by public key.
///
/// Performs a two-step lookup: public key -> user_id -> user data.
pub async fn get_user_by_public_key<C>(
    con: &mut C,
    public_key: &str,
) -> Result<Option<UserRecord>, StorageError>
where
    C: AsyncCommands,
{
    let pubkey_key = format!("pubkey:{}", public_key);
    let user_id: Option<String> = con.get(&pubkey_key).await?;

    match user_id {
        Some(id) => get_user(con, &id).await,
        None => Ok(None),
    }
}

/// Redis-backed user directory.
#[derive(Clone)]
pub struct RedisUserDirectory {
    client: redis::Client,
}

impl RedisUserDirectory {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StorageError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl UserLookup for RedisUserDirectory {
    async fn find_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<UserRecord>, StorageError> {
        let mut con = self.connection().await?;
        get_user_by_public_key(&mut con, public_key).await
    }
}

#[async_trait]
impl UserRegistry for RedisUserDirectory {
    async fn insert(&self, user: &UserRecord) -> Result<bool, StorageError> {
        let mut con = self.connection().await?;
        store_user(&mut con, user).await
    }
}
