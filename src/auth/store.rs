//! In-memory session table.
//!
//! Every operation takes the lock once, does its read or write, and releases
//! it. Expired entries are evicted by whichever operation touches them first;
//! `sweep_expired` is an optional bulk pass on top of that.

use super::session::{
    challenge_for, generate_session_id, Clock, Session, SystemClock, SESSION_LIFETIME_SECS,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
    lifetime_secs: u64,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>, lifetime_secs: u64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
            lifetime_secs,
        }
    }

    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime_secs
    }

    // A panic while holding the lock cannot leave a half-written entry behind,
    // so a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a pending session for `public_key`.
    ///
    /// Returns `(session_id, challenge)`.
    pub fn create(&self, public_key: &str) -> (String, String) {
        let expires_at = self.clock.now().saturating_add(self.lifetime_secs);
        let mut sessions = self.lock();

        let mut session_id = generate_session_id();
        while sessions.contains_key(&session_id) {
            session_id = generate_session_id();
        }

        let challenge = challenge_for(&session_id);
        sessions.insert(
            session_id.clone(),
            Session {
                session_id: session_id.clone(),
                public_key: public_key.to_string(),
                challenge: challenge.clone(),
                expires_at,
                verified: false,
            },
        );

        (session_id, challenge)
    }

    /// Look up a live session, evicting it if it has expired.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let now = self.clock.now();
        let mut sessions = self.lock();
        live_entry(&mut sessions, session_id, now).cloned()
    }

    /// Flip a live session to verified.
    ///
    /// Returns `false` if the session is absent or expired.
    pub fn mark_verified(&self, session_id: &str) -> bool {
        let now = self.clock.now();
        let mut sessions = self.lock();
        match live_entry(&mut sessions, session_id, now) {
            Some(session) => {
                session.verified = true;
                true
            }
            None => false,
        }
    }

    pub fn is_valid(&self, session_id: &str) -> bool {
        let now = self.clock.now();
        let mut sessions = self.lock();
        live_entry(&mut sessions, session_id, now).is_some_and(|s| s.verified)
    }

    /// Claimed public key of a verified, live session.
    ///
    /// Pending sessions do not reveal who they claim to be.
    pub fn public_key_for(&self, session_id: &str) -> Option<String> {
        let now = self.clock.now();
        let mut sessions = self.lock();
        live_entry(&mut sessions, session_id, now)
            .filter(|s| s.verified)
            .map(|s| s.public_key.clone())
    }

    /// Drop a session regardless of its state.
    pub fn remove(&self, session_id: &str) -> bool {
        self.lock().remove(session_id).is_some()
    }

    /// Evict every expired session. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        before - sessions.len()
    }

    /// Number of entries currently held, expired ones included until evicted.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), SESSION_LIFETIME_SECS)
    }
}

fn live_entry<'a>(
    sessions: &'a mut HashMap<String, Session>,
    session_id: &str,
    now: u64,
) -> Option<&'a mut Session> {
    if sessions.get(session_id)?.is_expired(now) {
        sessions.remove(session_id);
        return None;
    }
    sessions.get_mut(session_id)
}
