//! Bech32 public key codec and seed-based key derivation.
//!
//! Public keys travel as NIP-19 `npub` strings. The raw 32-byte form is what
//! the verifier consumes.

use bech32::{Bech32, Hrp};
use ed25519_dalek::SigningKey;
use zeroize::Zeroizing;

/// Human-readable part of an encoded public key.
pub const NPUB_HRP: Hrp = Hrp::parse_unchecked("npub");

/// Length of a raw public key and of a raw seed.
pub const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid bech32 encoding: {0}")]
    Decode(String),

    #[error("Invalid key prefix: expected 'npub', got '{0}'")]
    InvalidPrefix(String),

    #[error("Invalid key length: expected 32 bytes, got {0}")]
    InvalidLength(usize),

    #[error("Invalid seed length: expected 32 bytes, got {0}")]
    InvalidSeedLength(usize),

    #[error("Invalid seed hex: {0}")]
    InvalidSeedHex(String),
}

/// Decode an `npub` string into its raw 32-byte public key.
///
/// Only canonical encodings are accepted: the string must be exactly what a
/// conformant bech32 encoder produces for the decoded payload, which rules out
/// bech32m checksums and non-zero padding bits.
pub fn decode_public_key(encoded: &str) -> Result<[u8; KEY_LEN], KeyError> {
    let (hrp, data) = bech32::decode(encoded).map_err(|e| KeyError::Decode(e.to_string()))?;

    if !hrp.as_str().eq_ignore_ascii_case(NPUB_HRP.as_str()) {
        return Err(KeyError::InvalidPrefix(hrp.to_string()));
    }

    let raw: [u8; KEY_LEN] = data
        .as_slice()
        .try_into()
        .map_err(|_| KeyError::InvalidLength(data.len()))?;

    let canonical = encode_public_key(&raw)?;
    if !canonical.eq_ignore_ascii_case(encoded) {
        return Err(KeyError::Decode("non-canonical encoding".to_string()));
    }

    Ok(raw)
}

/// Encode a raw public key as an `npub` string.
pub fn encode_public_key(raw: &[u8; KEY_LEN]) -> Result<String, KeyError> {
    bech32::encode::<Bech32>(NPUB_HRP, raw).map_err(|e| KeyError::Decode(e.to_string()))
}

/// Validate an `npub` string and return its canonical lowercase form.
///
/// Sessions and user records are keyed by this form, so every spelling of
/// one key resolves to the same identity.
pub fn normalize_public_key(encoded: &str) -> Result<String, KeyError> {
    encode_public_key(&decode_public_key(encoded.trim())?)
}

/// Derive the Ed25519 public key for a 32-byte seed.
///
/// Matches `nacl.sign.keyPair.fromSeed`, which older web clients used to sign
/// challenges with a seed unrelated to the `npub` they registered.
pub fn derive_public_key_from_seed(seed: &[u8]) -> Result<[u8; KEY_LEN], KeyError> {
    let seed: Zeroizing<[u8; KEY_LEN]> = Zeroizing::new(
        seed.try_into()
            .map_err(|_| KeyError::InvalidSeedLength(seed.len()))?,
    );
    let signing_key = SigningKey::from_bytes(&seed);
    Ok(signing_key.verifying_key().to_bytes())
}

/// Decode a hex-encoded seed as persisted on user records.
pub fn decode_seed_hex(seed_hex: &str) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    let seed = Zeroizing::new(
        hex::decode(seed_hex.trim()).map_err(|e| KeyError::InvalidSeedHex(e.to_string()))?,
    );
    if seed.len() != KEY_LEN {
        return Err(KeyError::InvalidSeedLength(seed.len()));
    }
    Ok(seed)
}
