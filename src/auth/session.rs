//! Session records, identifier and challenge generation, and time source.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Prefix of every challenge string handed to clients.
pub const CHALLENGE_PREFIX: &str = "auth-challenge:";

/// Default session lifetime in seconds.
pub const SESSION_LIFETIME_SECS: u64 = 300;

/// Generate a fresh session identifier (UUIDv4, 122 random bits).
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// The exact string a key holder must sign for `session_id`.
pub fn challenge_for(session_id: &str) -> String {
    format!("{}{}", CHALLENGE_PREFIX, session_id)
}

/// Lifecycle of a session that has not expired yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Verified,
}

/// An authentication attempt keyed by its session identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    /// Claimed identity, `npub` encoded. Unproven until `verified`.
    pub public_key: String,
    pub challenge: String,
    /// Unix seconds. The session is gone at and after this instant.
    pub expires_at: u64,
    pub verified: bool,
}

impl Session {
    pub fn state(&self) -> SessionState {
        if self.verified {
            SessionState::Verified
        } else {
            SessionState::Pending
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Source of the current time in unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
