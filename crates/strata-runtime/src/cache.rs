//! In-memory cache of resolved values.
//!
//! Entries are shared `Arc`s swapped in whole under a write lock, so a
//! reader never observes a partially written value.
//!
//! Every configuration key carries an epoch that invalidating the key bumps,
//! and [`ResolvedCache::clear`] bumps a generation shared by all keys. A
//! resolution records its key's [`CacheEpoch`] before reading the layers and
//! may only publish its result if the epoch is unchanged, which keeps results
//! computed against pre-invalidation state out of the post-invalidation
//! cache without holding back unrelated keys.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use strata_core::{CacheKey, ConfigValue};

/// Snapshot of one key's invalidation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEpoch {
    generation: u64,
    key: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, Arc<ConfigValue>>,
    generation: u64,
    key_epochs: HashMap<String, u64>,
}

impl CacheState {
    fn epoch(&self, key: &str) -> CacheEpoch {
        CacheEpoch {
            generation: self.generation,
            key: self.key_epochs.get(key).copied().unwrap_or_default(),
        }
    }
}

/// Process-lifetime map from [`CacheKey`] to resolved value.
#[derive(Default)]
pub struct ResolvedCache {
    state: RwLock<CacheState>,
}

impl ResolvedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<ConfigValue>> {
        self.state.read().entries.get(key).cloned()
    }

    /// The current invalidation epoch of configuration key `key`.
    pub fn epoch(&self, key: &str) -> CacheEpoch {
        self.state.read().epoch(key)
    }

    /// Publishes `value` unless its configuration key was invalidated since
    /// `epoch` was read.
    pub fn insert_if_current(
        &self,
        key: CacheKey,
        value: Arc<ConfigValue>,
        epoch: CacheEpoch,
    ) -> bool {
        let mut state = self.state.write();
        if state.epoch(key.key()) != epoch {
            return false;
        }
        state.entries.insert(key, value);
        true
    }

    /// Drops every entry for configuration key `key`, across all contexts.
    pub fn invalidate_key(&self, key: &str) -> usize {
        let mut state = self.state.write();
        let before = state.entries.len();
        state.entries.retain(|cache_key, _| cache_key.key() != key);
        *state.key_epochs.entry(key.to_string()).or_default() += 1;
        before - state.entries.len()
    }

    /// Drops every entry.
    pub fn clear(&self) -> usize {
        let mut state = self.state.write();
        let removed = state.entries.len();
        state.entries.clear();
        state.key_epochs.clear();
        state.generation += 1;
        removed
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }
}
