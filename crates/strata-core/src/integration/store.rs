//! Persistent override store contract.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::foundation::value::ConfigValue;

/// Durable key → override document cache.
///
/// Backing storage may hold data written by an older schema or by another
/// program. Implementations report such entries as
/// [`StoreError::Corrupt`]; callers treat that as "no entry".
///
/// Each `set` must replace the entry atomically: a concurrent `get` sees
/// either the previous document or the new one.
pub trait OverrideStore: Send + Sync + 'static {
    /// Reads the document stored for `key`.
    fn get(&self, key: &str) -> StoreResult<Option<ConfigValue>>;

    /// Replaces the document stored for `key`.
    fn set(&self, key: &str, document: &ConfigValue) -> StoreResult<()>;

    /// Removes the entry for `key`, or every entry when `key` is `None`.
    fn clear(&self, key: Option<&str>) -> StoreResult<()>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "override-store"
    }
}

/// In-process override store.
///
/// Documents are held in their serialized form and parsed on read, the same
/// round trip a durable backend performs, so foreign bytes planted with
/// [`put_raw`](Self::put_raw) surface as corrupt entries.
#[derive(Default)]
pub struct MemoryOverrideStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores raw bytes for `key` without validation.
    pub fn put_raw(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries.write().insert(key.into(), bytes.into());
    }

    /// Number of successful `set` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl OverrideStore for MemoryOverrideStore {
    fn get(&self, key: &str) -> StoreResult<Option<ConfigValue>> {
        let entries = self.entries.read();
        let Some(bytes) = entries.get(key) else {
            return Ok(None);
        };
        let document = ConfigValue::from_json_slice(bytes)
            .map_err(|e| StoreError::corrupt(key, e.to_string()))?;
        if !document.is_map() {
            return Err(StoreError::corrupt(
                key,
                format!("expected a mapping, found {}", document.kind()),
            ));
        }
        Ok(Some(document))
    }

    fn set(&self, key: &str, document: &ConfigValue) -> StoreResult<()> {
        let bytes = document
            .to_json_vec()
            .map_err(|e| StoreError::Serialize(e.to_string()))?;
        self.entries.write().insert(key.to_string(), bytes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self, key: Option<&str>) -> StoreResult<()> {
        let mut entries = self.entries.write();
        match key {
            Some(key) => {
                entries.remove(key);
            }
            None => entries.clear(),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_then_get() {
        let store = MemoryOverrideStore::new();
        let doc = ConfigValue::from(json!({"flag": true}));

        assert_eq!(store.get("flags").unwrap(), None);
        store.set("flags", &doc).unwrap();
        assert_eq!(store.get("flags").unwrap(), Some(doc));
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_foreign_bytes_are_corrupt() {
        let store = MemoryOverrideStore::new();
        store.put_raw("flags", b"\x00\x01legacy".to_vec());
        store.put_raw("themes", b"[1,2,3]".to_vec());

        assert!(matches!(store.get("flags"), Err(StoreError::Corrupt { .. })));
        assert!(matches!(store.get("themes"), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_clear_single_and_all() {
        let store = MemoryOverrideStore::new();
        let doc = ConfigValue::from(json!({"a": 1}));
        store.set("a", &doc).unwrap();
        store.set("b", &doc).unwrap();

        store.clear(Some("a")).unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.len(), 1);

        store.clear(None).unwrap();
        store.clear(None).unwrap();
        assert!(store.is_empty());
    }
}
