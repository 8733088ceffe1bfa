//! Resolution counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub(crate) struct StatsCounters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    source_failures: AtomicU64,
    store_corruptions: AtomicU64,
    store_write_failures: AtomicU64,
    fetches_started: AtomicU64,
    fetch_failures: AtomicU64,
    overrides_updated: AtomicU64,
}

macro_rules! counter {
    ($($record:ident => $field:ident),* $(,)?) => {
        impl StatsCounters {
            $(
                pub(crate) fn $record(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }
            )*
        }
    };
}

counter! {
    record_hit => cache_hits,
    record_miss => cache_misses,
    record_source_failure => source_failures,
    record_store_corruption => store_corruptions,
    record_store_write_failure => store_write_failures,
    record_fetch_started => fetches_started,
    record_fetch_failure => fetch_failures,
    record_override_updated => overrides_updated,
}

impl StatsCounters {
    pub(crate) fn snapshot(&self, cached_entries: usize) -> ResolverStats {
        ResolverStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            source_failures: self.source_failures.load(Ordering::Relaxed),
            store_corruptions: self.store_corruptions.load(Ordering::Relaxed),
            store_write_failures: self.store_write_failures.load(Ordering::Relaxed),
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            overrides_updated: self.overrides_updated.load(Ordering::Relaxed),
            cached_entries,
        }
    }
}

/// Statistics about a [`ConfigManager`](crate::ConfigManager).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Resolutions served from the in-memory cache.
    pub cache_hits: u64,
    /// Resolutions that read the layers.
    pub cache_misses: u64,
    /// Remote reads that failed or returned a non-mapping entry.
    pub source_failures: u64,
    /// Stored override documents that failed to decode.
    pub store_corruptions: u64,
    /// Fetched override documents the store failed to persist.
    pub store_write_failures: u64,
    /// Override fetches started, background and manual.
    pub fetches_started: u64,
    /// Override fetches that failed.
    pub fetch_failures: u64,
    /// Fetches that replaced the stored override document.
    pub overrides_updated: u64,
    /// Entries currently in the resolved cache.
    pub cached_entries: usize,
}

impl std::fmt::Display for ResolverStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} entries ({} hits, {} misses), source failures: {}, fetches: {} ({} failed, {} updated), store write failures: {}",
            self.cached_entries,
            self.cache_hits,
            self.cache_misses,
            self.source_failures,
            self.fetches_started,
            self.fetch_failures,
            self.overrides_updated,
            self.store_write_failures
        )
    }
}
