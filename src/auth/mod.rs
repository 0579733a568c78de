//! Challenge-response authentication over bech32 public keys.

pub mod keys;
pub mod middleware;
pub mod service;
pub mod session;
pub mod store;
pub mod verify;

pub use middleware::{AppState, AuthUser, SessionToken};
pub use service::{AuthError, ChallengeService, IssuePolicy};
pub use session::{Clock, ManualClock, Session, SessionState, SystemClock};
pub use store::SessionStore;
pub use verify::{verify_signature, Ed25519SeedDerivation, LegacyKeyDerivation, SignatureVerifier};
