//! Background sweep of expired sessions.
//!
//! Expired sessions are already evicted when next accessed. Sessions that are
//! never touched again (abandoned challenges) would otherwise linger, so this
//! job periodically drops everything past its expiry.

use crate::auth::ChallengeService;
use std::sync::Arc;
use std::time::Duration;

/// Run the sweep loop.
///
/// Sweeps the session store every `interval`. Never returns.
pub async fn run_sweep_loop(service: Arc<ChallengeService>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        sweep_once(&service);
    }
}

/// Evict expired sessions once. Returns how many were removed.
pub fn sweep_once(service: &ChallengeService) -> usize {
    let removed = service.sweep_expired();
    if removed > 0 {
        tracing::info!(
            removed = removed,
            remaining = service.store().len(),
            "Session sweep completed"
        );
    }
    removed
}
