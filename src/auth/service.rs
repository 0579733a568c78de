//! Challenge-response protocol: issue, verify, and answer session queries.
//!
//! Per session: `Pending` until a signature over its challenge verifies, then
//! `Verified` until `expires_at`, after which it is gone. Every failure caused
//! by untrusted input (bad key, bad signature, unknown or expired session)
//! surfaces as `false` / `None`.

use super::keys::{self, KeyError};
use super::store::SessionStore;
use super::verify::{SignatureVerifier, VerifiedBy};
use crate::storage::{StorageError, UserLookup};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Who may request a challenge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IssuePolicy {
    /// Any well-formed public key. Identity is resolved after verification.
    #[default]
    Open,
    /// Only public keys with a user record.
    RegisteredOnly,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(#[from] KeyError),

    #[error("No user registered for this public key")]
    UnknownUser,

    #[error("User lookup failed: {0}")]
    Lookup(#[from] StorageError),
}

pub struct ChallengeService {
    store: SessionStore,
    verifier: SignatureVerifier,
    users: Arc<dyn UserLookup>,
    policy: IssuePolicy,
}

impl ChallengeService {
    pub fn new(store: SessionStore, users: Arc<dyn UserLookup>) -> Self {
        Self {
            store,
            verifier: SignatureVerifier::default(),
            users,
            policy: IssuePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: IssuePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_verifier(mut self, verifier: SignatureVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn policy(&self) -> IssuePolicy {
        self.policy
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Open a session for `public_key` and return `(session_id, challenge)`.
    ///
    /// The session records the key in canonical form.
    pub async fn issue_challenge(&self, public_key: &str) -> Result<(String, String), AuthError> {
        let public_key = keys::normalize_public_key(public_key)?;

        if self.policy == IssuePolicy::RegisteredOnly
            && self.users.find_by_public_key(&public_key).await?.is_none()
        {
            return Err(AuthError::UnknownUser);
        }

        let (session_id, challenge) = self.store.create(&public_key);
        tracing::debug!(action = "challenge_issued", session_id = %session_id, "Challenge issued");
        Ok((session_id, challenge))
    }

    /// Check `signature` against the session's challenge and mark the session
    /// verified on success.
    ///
    /// Calling again after success re-verifies and still returns `true`.
    pub async fn verify_signature(&self, session_id: &str, signature: &[u8]) -> bool {
        let Some(session) = self.store.get(session_id) else {
            tracing::debug!(action = "verify_rejected", session_id = %session_id, "Session not found or expired");
            return false;
        };

        let raw_pubkey = match keys::decode_public_key(&session.public_key) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(action = "verify_rejected", session_id = %session_id, error = %e, "Stored public key does not decode");
                return false;
            }
        };

        // The store lock is not held here; the seed lookup may suspend.
        let outcome = self
            .verifier
            .verify_with_fallback(
                &raw_pubkey,
                session.challenge.as_bytes(),
                signature,
                || self.alternate_seed(&session.public_key),
            )
            .await;

        let Some(verified_by) = outcome else {
            tracing::warn!(action = "auth_failed", session_id = %session_id, "Invalid signature");
            return false;
        };

        if !self.store.mark_verified(session_id) {
            tracing::debug!(action = "verify_rejected", session_id = %session_id, "Session expired during verification");
            return false;
        }

        if verified_by == VerifiedBy::AlternateSeed {
            tracing::info!(action = "auth_success", session_id = %session_id, via = "alternate_seed", "Session verified with legacy key");
        } else {
            tracing::info!(action = "auth_success", session_id = %session_id, "Session verified");
        }
        true
    }

    pub fn is_session_valid(&self, session_id: &str) -> bool {
        self.store.is_valid(session_id)
    }

    pub fn public_key_for_session(&self, session_id: &str) -> Option<String> {
        self.store.public_key_for(session_id)
    }

    pub fn revoke_session(&self, session_id: &str) -> bool {
        self.store.remove(session_id)
    }

    pub fn sweep_expired(&self) -> usize {
        self.store.sweep_expired()
    }

    /// Seed on record for `public_key`, if any. Lookup failures count as no
    /// seed so verification fails closed.
    async fn alternate_seed(&self, public_key: &str) -> Option<Zeroizing<Vec<u8>>> {
        let user = match self.users.find_by_public_key(public_key).await {
            Ok(user) => user?,
            Err(e) => {
                tracing::warn!(action = "fallback_unavailable", error = %e, "User lookup failed");
                return None;
            }
        };

        let seed_hex = Zeroizing::new(user.raw_seed?);
        match keys::decode_seed_hex(&seed_hex) {
            Ok(seed) => Some(seed),
            Err(e) => {
                tracing::warn!(action = "fallback_unavailable", user_id = %user.id, error = %e, "Stored seed is malformed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::{ManualClock, SESSION_LIFETIME_SECS};
    use crate::models::UserRecord;
    use crate::storage::{MemoryUserDirectory, UserRegistry};
    use async_trait::async_trait;
    use ed25519_dalek::{Signer, SigningKey};

    const T0: u64 = 1_700_000_000;

    struct Harness {
        service: Arc<ChallengeService>,
        clock: Arc<ManualClock>,
        users: Arc<MemoryUserDirectory>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(T0));
        let users = Arc::new(MemoryUserDirectory::new());
        let store = SessionStore::new(clock.clone(), SESSION_LIFETIME_SECS);
        let service = Arc::new(ChallengeService::new(store, users.clone()));
        Harness {
            service,
            clock,
            users,
        }
    }

    fn test_keypair() -> (SigningKey, String) {
        let mut seed = [0u8; 32];
        rand::fill(&mut seed);
        let signing_key = SigningKey::from_bytes(&seed);
        let npub = keys::encode_public_key(signing_key.verifying_key().as_bytes()).unwrap();
        (signing_key, npub)
    }

    fn user_for(npub: &str, raw_seed: Option<String>) -> UserRecord {
        UserRecord {
            id: nanoid::nanoid!(12),
            nostr_public_key: npub.to_string(),
            lightning_address: None,
            raw_seed,
            created_at: T0,
        }
    }

    struct FailingLookup;

    #[async_trait]
    impl UserLookup for FailingLookup {
        async fn find_by_public_key(
            &self,
            _public_key: &str,
        ) -> Result<Option<UserRecord>, StorageError> {
            Err(StorageError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            ))))
        }
    }

    #[tokio::test]
    async fn test_single_verification_path() {
        let h = harness();
        let (key, npub) = test_keypair();

        let (sid, challenge) = h.service.issue_challenge(&npub).await.unwrap();
        assert_eq!(challenge, format!("auth-challenge:{}", sid));
        assert!(!h.service.is_session_valid(&sid));
        assert_eq!(h.service.public_key_for_session(&sid), None);

        let signature = key.sign(challenge.as_bytes()).to_bytes();
        assert!(h.service.verify_signature(&sid, &signature).await);

        assert!(h.service.is_session_valid(&sid));
        assert_eq!(h.service.public_key_for_session(&sid), Some(npub));
    }

    #[tokio::test]
    async fn test_verify_is_idempotent() {
        let h = harness();
        let (key, npub) = test_keypair();
        let (sid, challenge) = h.service.issue_challenge(&npub).await.unwrap();
        let signature = key.sign(challenge.as_bytes()).to_bytes();

        assert!(h.service.verify_signature(&sid, &signature).await);
        assert!(h.service.verify_signature(&sid, &signature).await);
        assert!(h.service.is_session_valid(&sid));
    }

    #[tokio::test]
    async fn test_tampered_challenge_rejected() {
        let h = harness();
        let (key, npub) = test_keypair();
        let (sid, challenge) = h.service.issue_challenge(&npub).await.unwrap();

        let truncated = &challenge[..challenge.len() - 1];
        let signature = key.sign(truncated.as_bytes()).to_bytes();
        assert!(!h.service.verify_signature(&sid, &signature).await);
        assert!(!h.service.is_session_valid(&sid));
    }

    #[tokio::test]
    async fn test_signature_for_other_session_rejected() {
        let h = harness();
        let (key, npub) = test_keypair();
        let (sid_a, _) = h.service.issue_challenge(&npub).await.unwrap();
        let (_, challenge_b) = h.service.issue_challenge(&npub).await.unwrap();

        let signature = key.sign(challenge_b.as_bytes()).to_bytes();
        assert!(!h.service.verify_signature(&sid_a, &signature).await);
    }

    #[tokio::test]
    async fn test_wrong_key_rejected() {
        let h = harness();
        let (_key, npub) = test_keypair();
        let (impostor, _) = test_keypair();
        let (sid, challenge) = h.service.issue_challenge(&npub).await.unwrap();

        let signature = impostor.sign(challenge.as_bytes()).to_bytes();
        assert!(!h.service.verify_signature(&sid, &signature).await);
    }

    #[tokio::test]
    async fn test_malformed_signature_rejected() {
        let h = harness();
        let (_key, npub) = test_keypair();
        let (sid, _) = h.service.issue_challenge(&npub).await.unwrap();

        assert!(!h.service.verify_signature(&sid, b"").await);
        assert!(!h.service.verify_signature(&sid, &[0u8; 63]).await);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let h = harness();
        assert!(!h.service.verify_signature("never-issued", &[0u8; 64]).await);
        assert!(!h.service.is_session_valid("never-issued"));
        assert_eq!(h.service.public_key_for_session("never-issued"), None);
    }

    #[tokio::test]
    async fn test_expired_session_rejected_and_purged() {
        let h = harness();
        let (key, npub) = test_keypair();
        let (sid, challenge) = h.service.issue_challenge(&npub).await.unwrap();
        let signature = key.sign(challenge.as_bytes()).to_bytes();

        h.clock.advance(300);
        assert!(!h.service.verify_signature(&sid, &signature).await);
        assert!(h.service.store().is_empty());
    }

    #[tokio::test]
    async fn test_verified_session_expires() {
        let h = harness();
        let (key, npub) = test_keypair();
        let (sid, challenge) = h.service.issue_challenge(&npub).await.unwrap();
        let signature = key.sign(challenge.as_bytes()).to_bytes();
        assert!(h.service.verify_signature(&sid, &signature).await);

        h.clock.advance(299);
        assert!(h.service.is_session_valid(&sid));
        h.clock.advance(1);
        assert!(!h.service.is_session_valid(&sid));
        assert_eq!(h.service.public_key_for_session(&sid), None);
        assert!(h.service.store().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_activation() {
        let h = harness();
        let (_registered_key, npub) = test_keypair();
        let legacy_seed = [5u8; 32];
        let legacy_key = SigningKey::from_bytes(&legacy_seed);
        h.users
            .insert(&user_for(&npub, Some(hex::encode(legacy_seed))))
            .await
            .unwrap();

        let (sid, challenge) = h.service.issue_challenge(&npub).await.unwrap();
        let signature = legacy_key.sign(challenge.as_bytes()).to_bytes();

        assert!(h.service.verify_signature(&sid, &signature).await);
        assert_eq!(h.service.public_key_for_session(&sid), Some(npub));
    }

    #[tokio::test]
    async fn test_uppercase_key_resolves_to_canonical_identity() {
        let h = harness();
        let (_registered_key, npub) = test_keypair();
        let legacy_seed = [6u8; 32];
        let legacy_key = SigningKey::from_bytes(&legacy_seed);
        h.users
            .insert(&user_for(&npub, Some(hex::encode(legacy_seed))))
            .await
            .unwrap();

        let (sid, challenge) = h
            .service
            .issue_challenge(&npub.to_uppercase())
            .await
            .unwrap();
        let signature = legacy_key.sign(challenge.as_bytes()).to_bytes();

        assert!(h.service.verify_signature(&sid, &signature).await);
        assert_eq!(h.service.public_key_for_session(&sid), Some(npub));
    }

    #[tokio::test]
    async fn test_fallback_fails_when_neither_key_verifies() {
        let h = harness();
        let (_registered_key, npub) = test_keypair();
        let (stranger, _) = test_keypair();
        h.users
            .insert(&user_for(&npub, Some(hex::encode([5u8; 32]))))
            .await
            .unwrap();

        let (sid, challenge) = h.service.issue_challenge(&npub).await.unwrap();
        let signature = stranger.sign(challenge.as_bytes()).to_bytes();

        assert!(!h.service.verify_signature(&sid, &signature).await);
        assert!(!h.service.is_session_valid(&sid));
    }

    #[tokio::test]
    async fn test_fallback_without_seed_on_record() {
        let h = harness();
        let (_registered_key, npub) = test_keypair();
        let legacy_key = SigningKey::from_bytes(&[5u8; 32]);
        h.users.insert(&user_for(&npub, None)).await.unwrap();

        let (sid, challenge) = h.service.issue_challenge(&npub).await.unwrap();
        let signature = legacy_key.sign(challenge.as_bytes()).to_bytes();

        assert!(!h.service.verify_signature(&sid, &signature).await);
    }

    #[tokio::test]
    async fn test_fallback_with_malformed_seed_fails_closed() {
        let h = harness();
        let (_registered_key, npub) = test_keypair();
        let legacy_key = SigningKey::from_bytes(&[5u8; 32]);
        h.users
            .insert(&user_for(&npub, Some("not-hex".to_string())))
            .await
            .unwrap();

        let (sid, challenge) = h.service.issue_challenge(&npub).await.unwrap();
        let signature = legacy_key.sign(challenge.as_bytes()).to_bytes();

        assert!(!h.service.verify_signature(&sid, &signature).await);
    }

    #[tokio::test]
    async fn test_lookup_failure_fails_closed() {
        let clock = Arc::new(ManualClock::new(T0));
        let store = SessionStore::new(clock, SESSION_LIFETIME_SECS);
        let service = ChallengeService::new(store, Arc::new(FailingLookup));
        let (key, npub) = test_keypair();
        let (stranger, _) = test_keypair();

        let (sid, challenge) = service.issue_challenge(&npub).await.unwrap();
        let bad = stranger.sign(challenge.as_bytes()).to_bytes();
        assert!(!service.verify_signature(&sid, &bad).await);

        // Primary path never touches the lookup
        let good = key.sign(challenge.as_bytes()).to_bytes();
        assert!(service.verify_signature(&sid, &good).await);
    }

    #[tokio::test]
    async fn test_issue_rejects_malformed_key() {
        let h = harness();
        assert!(matches!(
            h.service.issue_challenge("npub1garbage").await,
            Err(AuthError::InvalidPublicKey(_))
        ));
        assert!(h.service.store().is_empty());
    }

    #[tokio::test]
    async fn test_open_policy_issues_for_unregistered_key() {
        let h = harness();
        let (_key, npub) = test_keypair();
        assert_eq!(h.service.policy(), IssuePolicy::Open);
        assert!(h.service.issue_challenge(&npub).await.is_ok());
    }

    #[tokio::test]
    async fn test_registered_only_policy() {
        let clock = Arc::new(ManualClock::new(T0));
        let users = Arc::new(MemoryUserDirectory::new());
        let store = SessionStore::new(clock, SESSION_LIFETIME_SECS);
        let service = ChallengeService::new(store, users.clone())
            .with_policy(IssuePolicy::RegisteredOnly);

        let (_key, npub) = test_keypair();
        assert!(matches!(
            service.issue_challenge(&npub).await,
            Err(AuthError::UnknownUser)
        ));

        users.insert(&user_for(&npub, None)).await.unwrap();
        assert!(service.issue_challenge(&npub).await.is_ok());
    }

    #[tokio::test]
    async fn test_registered_only_policy_lookup_failure() {
        let clock = Arc::new(ManualClock::new(T0));
        let store = SessionStore::new(clock, SESSION_LIFETIME_SECS);
        let service = ChallengeService::new(store, Arc::new(FailingLookup))
            .with_policy(IssuePolicy::RegisteredOnly);
        let (_key, npub) = test_keypair();

        assert!(matches!(
            service.issue_challenge(&npub).await,
            Err(AuthError::Lookup(_))
        ));
    }

    #[tokio::test]
    async fn test_revoke_session() {
        let h = harness();
        let (key, npub) = test_keypair();
        let (sid, challenge) = h.service.issue_challenge(&npub).await.unwrap();
        let signature = key.sign(challenge.as_bytes()).to_bytes();
        assert!(h.service.verify_signature(&sid, &signature).await);

        assert!(h.service.revoke_session(&sid));
        assert!(!h.service.is_session_valid(&sid));
        assert!(!h.service.verify_signature(&sid, &signature).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_verification_of_one_session() {
        let h = harness();
        let (key, npub) = test_keypair();
        let (sid, challenge) = h.service.issue_challenge(&npub).await.unwrap();
        let signature = key.sign(challenge.as_bytes()).to_bytes();

        let tasks: Vec<_> = (0..100)
            .map(|_| {
                let service = h.service.clone();
                let sid = sid.clone();
                tokio::spawn(async move { service.verify_signature(&sid, &signature).await })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap());
        }

        assert_eq!(h.service.store().len(), 1);
        assert!(h.service.is_session_valid(&sid));
        assert_eq!(h.service.public_key_for_session(&sid), Some(npub));
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let h = harness();
        let (_key, npub) = test_keypair();
        h.service.issue_challenge(&npub).await.unwrap();
        h.service.issue_challenge(&npub).await.unwrap();

        assert_eq!(h.service.sweep_expired(), 0);
        h.clock.advance(300);
        assert_eq!(h.service.sweep_expired(), 2);
        assert!(h.service.store().is_empty());
    }
}
