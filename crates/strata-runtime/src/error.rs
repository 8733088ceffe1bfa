//! Runtime error types.

use strata_core::{CatalogError, FetchError, SourceError, StoreError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while assembling a [`ConfigManager`](crate::ConfigManager).
///
/// These are startup failures. Once built, a manager never returns an
/// error from `resolve`.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// The default catalog is missing a recognized key.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A required collaborator was not supplied.
    #[error("config manager is missing its {0}")]
    MissingComponent(&'static str),

    /// The persistent override store could not be opened.
    #[error("failed to open override store: {0}")]
    Store(#[from] StoreError),

    /// The override transport could not be constructed.
    #[error("failed to build override transport: {0}")]
    Transport(String),

    /// Resolver settings are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for manager construction.
pub type ResolverResult<T> = Result<T, ResolverError>;

/// Why refreshing one key's override document failed.
#[derive(Error, Debug)]
pub enum RefreshError {
    /// The remote entry carrying the override URL could not be read.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The override document could not be fetched or was rejected.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The fetched document could not be persisted.
    #[error("failed to persist override document: {0}")]
    Store(#[from] StoreError),

    /// The manager was built without a transport.
    #[error("no override transport configured")]
    NoTransport,
}
