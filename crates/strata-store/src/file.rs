//! File-backed override store.
//!
//! Layout: `<dir>/<encoded key>.override.json`, each file holding an envelope
//!
//! ```json
//! {"version": 1, "key": "feature_flags", "document": {"flag": true}}
//! ```
//!
//! Writes go to a temporary file in the same directory which is then
//! renamed over the target, so readers in any process observe either the
//! old envelope or the new one.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strata_core::{ConfigValue, OverrideStore, StoreError, StoreResult};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Envelope schema version written by this store.
pub const ENVELOPE_VERSION: u32 = 1;

/// Suffix of envelope files; `clear(None)` leaves every other file alone.
const SUFFIX: &str = ".override.json";

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    key: &'a str,
    document: &'a ConfigValue,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    key: String,
    document: ConfigValue,
}

/// Durable [`OverrideStore`] keeping one JSON envelope per key.
pub struct FileOverrideStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileOverrideStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!(path = %dir.display(), "Opened file override store");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the envelope file for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{SUFFIX}", encode_key(key)))
    }

    fn decode(key: &str, bytes: &[u8]) -> StoreResult<ConfigValue> {
        let envelope: Envelope =
            serde_json::from_slice(bytes).map_err(|e| StoreError::corrupt(key, e.to_string()))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(StoreError::corrupt(
                key,
                format!(
                    "envelope version {} (expected {ENVELOPE_VERSION})",
                    envelope.version
                ),
            ));
        }
        if envelope.key != key {
            return Err(StoreError::corrupt(
                key,
                format!("envelope belongs to key '{}'", envelope.key),
            ));
        }
        if !envelope.document.is_map() {
            return Err(StoreError::corrupt(
                key,
                format!("expected a mapping, found {}", envelope.document.kind()),
            ));
        }
        Ok(envelope.document)
    }
}

impl OverrideStore for FileOverrideStore {
    fn get(&self, key: &str) -> StoreResult<Option<ConfigValue>> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::decode(key, &bytes).map(Some)
    }

    fn set(&self, key: &str, document: &ConfigValue) -> StoreResult<()> {
        let envelope = EnvelopeRef {
            version: ENVELOPE_VERSION,
            key,
            document,
        };
        let bytes =
            serde_json::to_vec(&envelope).map_err(|e| StoreError::Serialize(e.to_string()))?;

        let path = self.path_for(key);
        let _guard = self.write_lock.lock();

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(key = %key, path = %path.display(), bytes = bytes.len(), "Persisted override document");
        Ok(())
    }

    fn clear(&self, key: Option<&str>) -> StoreResult<()> {
        let _guard = self.write_lock.lock();

        if let Some(key) = key {
            return match fs::remove_file(self.path_for(key)) {
                Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        let mut removed = 0usize;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_envelope = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(SUFFIX));
            if !is_envelope {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove override file");
                    return Err(e.into());
                }
            }
        }
        info!(removed, path = %self.dir.display(), "Cleared file override store");
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Maps a key to a file stem. ASCII alphanumerics, `-` and `_` pass through;
/// every other byte becomes `%XX`, so distinct keys never share a file and no
/// key can escape the store directory.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
