//! Consecutive store failure tracking.
//!
//! Handlers report every store outcome. Once `threshold` failures arrive in a
//! row the tracker trips, and [`StoreHealth::wait_tripped`] resolves so the
//! server can shut down gracefully. A threshold of 0 never trips.

use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::watch;

#[derive(Debug)]
pub struct StoreHealth {
    threshold: u32,
    consecutive: AtomicU32,
    tripped: watch::Sender<bool>,
}

impl StoreHealth {
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        let (tripped, _) = watch::channel(false);
        Self { threshold, consecutive: AtomicU32::new(0), tripped }
    }

    pub fn record_success(&self) {
        self.consecutive.store(0, Ordering::Relaxed);
    }

    /// Count a failure; returns true if this one tripped the tracker.
    pub fn record_failure(&self) -> bool {
        let n = self.consecutive.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        if self.threshold == 0 || n < self.threshold {
            log::warn!("store failure {n} in a row");
            return false;
        }
        let first = self.tripped.send_if_modified(|t| !std::mem::replace(t, true));
        if first {
            log::error!("store failed {n} times in a row, shutting down");
        }
        first
    }

    #[must_use]
    pub fn is_tripped(&self) -> bool {
        *self.tripped.borrow()
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive.load(Ordering::Relaxed)
    }

    /// Resolves once the tracker has tripped. Never resolves for threshold 0.
    pub async fn wait_tripped(&self) {
        let mut rx = self.tripped.subscribe();
        // The sender lives in self, so the channel cannot close while we wait.
        let _ = rx.wait_for(|t| *t).await;
    }
}
