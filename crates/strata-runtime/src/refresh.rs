//! Per-key bookkeeping for override refreshes.
//!
//! A background refresh for a key may start only when no refresh for that
//! key is in flight and the previous attempt is older than the refresh
//! interval. The in-flight flag is owned by a [`RefreshGuard`] and cleared
//! when the guard drops, on success, failure, timeout or cancellation alike.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct KeyState {
    in_flight: bool,
    last_attempt: Option<Instant>,
}

/// Tracks in-flight refreshes and refresh cycles per configuration key.
pub struct RefreshTracker {
    interval: Duration,
    states: Mutex<HashMap<String, KeyState>>,
}

impl RefreshTracker {
    /// Creates a tracker with one refresh cycle lasting `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Claims the refresh slot for `key` if it is idle and due.
    pub fn try_begin(self: &Arc<Self>, key: &str) -> Option<RefreshGuard> {
        let mut states = self.states.lock();
        let state = states.entry(key.to_string()).or_default();

        if state.in_flight {
            return None;
        }
        if let Some(last) = state.last_attempt
            && last.elapsed() < self.interval
        {
            return None;
        }

        state.in_flight = true;
        state.last_attempt = Some(Instant::now());
        Some(RefreshGuard {
            tracker: Arc::clone(self),
            key: key.to_string(),
        })
    }

    /// Records an attempt that bypassed [`try_begin`](Self::try_begin).
    pub fn mark_attempt(&self, key: &str) {
        self.states
            .lock()
            .entry(key.to_string())
            .or_default()
            .last_attempt = Some(Instant::now());
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.states.lock().get(key).is_some_and(|s| s.in_flight)
    }

    /// Starts a new refresh cycle for every key. In-flight flags are kept.
    pub fn reset_cycle(&self) {
        for state in self.states.lock().values_mut() {
            state.last_attempt = None;
        }
    }

    /// Every key an override URL has been observed for.
    pub fn keys(&self) -> BTreeSet<String> {
        self.states.lock().keys().cloned().collect()
    }

    fn finish(&self, key: &str) {
        if let Some(state) = self.states.lock().get_mut(key) {
            state.in_flight = false;
        }
    }
}

/// Holds the in-flight slot of one key.
pub struct RefreshGuard {
    tracker: Arc<RefreshTracker>,
    key: String,
}

impl RefreshGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.tracker.finish(&self.key);
    }
}
