//! Ed25519 signature verification with a legacy-seed fallback.

use super::keys::{self, KeyError, KEY_LEN};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use std::future::Future;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Verify an Ed25519 signature against a message.
///
/// # Returns
/// * `Ok(true)` if signature is valid
/// * `Ok(false)` if the signature is invalid, has the wrong length, or the key
///   is not a valid curve point
/// * `Err(KeyError::InvalidLength)` if the key is not 32 bytes
pub fn verify_signature(
    raw_public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let pubkey_array: [u8; KEY_LEN] = raw_public_key
        .try_into()
        .map_err(|_| KeyError::InvalidLength(raw_public_key.len()))?;

    let Ok(verifying_key) = VerifyingKey::from_bytes(&pubkey_array) else {
        return Ok(false);
    };

    let Ok(signature_array) = <[u8; 64]>::try_from(signature) else {
        return Ok(false);
    };
    let signature = Signature::from_bytes(&signature_array);

    Ok(verifying_key.verify(message, &signature).is_ok())
}

/// Which key ended up validating a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifiedBy {
    PrimaryKey,
    AlternateSeed,
}

/// Key derivation used by legacy clients that signed with a seed of their own.
pub trait LegacyKeyDerivation: Send + Sync {
    fn derive(&self, seed: &[u8]) -> Result<[u8; KEY_LEN], KeyError>;
}

/// `nacl.sign.keyPair.fromSeed` compatible derivation.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519SeedDerivation;

impl LegacyKeyDerivation for Ed25519SeedDerivation {
    fn derive(&self, seed: &[u8]) -> Result<[u8; KEY_LEN], KeyError> {
        keys::derive_public_key_from_seed(seed)
    }
}

/// Two-step verifier: the decoded public key first, then a key derived from
/// the alternate seed on record for that identity.
#[derive(Clone)]
pub struct SignatureVerifier {
    legacy: Arc<dyn LegacyKeyDerivation>,
}

impl SignatureVerifier {
    pub fn new(legacy: Arc<dyn LegacyKeyDerivation>) -> Self {
        Self { legacy }
    }

    /// Verify against `primary`, falling back to the alternate seed.
    ///
    /// `alternate_seed` is only invoked when the primary key does not verify,
    /// and at most once. A missing seed or a seed the derivation rejects fails
    /// closed.
    pub async fn verify_with_fallback<F, Fut>(
        &self,
        primary: &[u8; KEY_LEN],
        message: &[u8],
        signature: &[u8],
        alternate_seed: F,
    ) -> Option<VerifiedBy>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Zeroizing<Vec<u8>>>>,
    {
        if matches!(verify_signature(primary, message, signature), Ok(true)) {
            return Some(VerifiedBy::PrimaryKey);
        }

        let seed = alternate_seed().await?;

        let candidate = match self.legacy.derive(&seed) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(action = "fallback_derivation_failed", error = %e, "Alternate seed rejected");
                return None;
            }
        };

        match verify_signature(&candidate, message, signature) {
            Ok(true) => Some(VerifiedBy::AlternateSeed),
            _ => None,
        }
    }
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::new(Arc::new(Ed25519SeedDerivation))
    }
}
