//! Remote baseline source contract.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::foundation::value::ConfigValue;

/// A live snapshot of key → raw remote entry, e.g. a remote-config service.
///
/// `get_raw` is called on every in-memory cache miss, so implementations
/// must answer from their own cached snapshot. The resolver never retries;
/// an error degrades that resolution to the default catalog.
pub trait RemoteSource: Send + Sync + 'static {
    /// Returns the raw entry for `key`, or `None` if the source has none.
    fn get_raw(&self, key: &str) -> SourceResult<Option<ConfigValue>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// A remote source backed by an in-process snapshot.
///
/// The snapshot can be replaced at any time, and the source can be switched
/// into an unavailable state to exercise degraded resolution.
pub struct StaticRemoteSource {
    name: String,
    entries: RwLock<HashMap<String, ConfigValue>>,
    available: AtomicBool,
    calls: AtomicUsize,
}

impl StaticRemoteSource {
    /// Creates an empty, available source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    /// Builds a source from a snapshot mapping of key → raw entry.
    pub fn from_snapshot(name: impl Into<String>, snapshot: ConfigValue) -> SourceResult<Self> {
        let name = name.into();
        let kind = snapshot.kind();
        let ConfigValue::Map(map) = snapshot else {
            return Err(SourceError::unavailable(
                name,
                format!("snapshot must be a mapping, got {kind}"),
            ));
        };
        let source = Self::new(name);
        source.entries.write().extend(map);
        Ok(source)
    }

    /// Adds an entry.
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Inserts or replaces an entry.
    pub fn set(&self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.entries.write().insert(key.into(), value.into());
    }

    /// Removes an entry.
    pub fn remove(&self, key: &str) -> Option<ConfigValue> {
        self.entries.write().remove(key)
    }

    /// Switches the source between reachable and unreachable.
    pub fn set_available(&self, available: bool) {
        debug!(source = %self.name, available, "Remote source availability changed");
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of `get_raw` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RemoteSource for StaticRemoteSource {
    fn get_raw(&self, key: &str) -> SourceResult<Option<ConfigValue>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(SourceError::unavailable(&self.name, "source is offline"));
        }
        Ok(self.entries.read().get(key).cloned())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
