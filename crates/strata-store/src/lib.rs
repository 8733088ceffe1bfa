//! Persistent override storage for Strata.
//!
//! Provides [`FileOverrideStore`], a durable [`OverrideStore`] that keeps one
//! JSON file per configuration key, and [`StoreConfig`] for choosing a
//! backend from configuration.
//!
//! | Kind | Backend | Survives restart |
//! |------|---------|------------------|
//! | `file` *(default)* | [`FileOverrideStore`] under `dir` | yes |
//! | `memory` | [`MemoryOverrideStore`] | no |
//!
//! Configure via `strata.toml`:
//!
//! ```toml
//! [store]
//! kind = "file"
//! dir = "./var/overrides"
//! ```
//!
//! When `dir` is omitted the store lives in `<user cache dir>/strata/overrides`.

mod file;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_core::{MemoryOverrideStore, OverrideStore, StoreError, StoreResult};
use tracing::info;

pub use file::{ENVELOPE_VERSION, FileOverrideStore};

/// Which [`OverrideStore`] backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Process-lifetime only.
    Memory,
    /// One JSON file per key under a directory.
    #[default]
    File,
}

/// Configuration for the persistent override store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend selection.
    pub kind: StoreKind,
    /// Directory for the file backend.
    pub dir: Option<PathBuf>,
}

impl StoreConfig {
    /// The directory the file backend uses, if one can be determined.
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        self.dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join("strata").join("overrides")))
    }
}

/// Opens the store described by `config`.
pub fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn OverrideStore>> {
    match config.kind {
        StoreKind::Memory => {
            info!("Using in-memory override store");
            Ok(Arc::new(MemoryOverrideStore::new()))
        }
        StoreKind::File => {
            let dir = config.resolved_dir().ok_or_else(|| {
                StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no store directory configured and no user cache directory available",
                ))
            })?;
            Ok(Arc::new(FileOverrideStore::open(dir)?))
        }
    }
}
