//! Unified error types for the Strata core.
//!
//! Every per-resolution error in this module is *recoverable*: the
//! orchestrator absorbs it and degrades by one precedence layer. The only
//! fatal condition is a [`CatalogError::MissingDefault`], which is raised
//! while a resolver is being built.

use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Remote Source Errors
// =============================================================================

/// Errors raised by a [`RemoteSource`](crate::RemoteSource).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The source could not be reached.
    #[error("remote source '{name}' unavailable: {reason}")]
    Unavailable {
        /// Name of the source.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// The source returned data that is not a mapping.
    #[error("remote source returned a malformed entry for '{key}': {reason}")]
    Malformed {
        /// The configuration key.
        key: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl SourceError {
    /// Creates an unavailable error.
    pub fn unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a malformed-entry error.
    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for remote source operations.
pub type SourceResult<T> = Result<T, SourceError>;

// =============================================================================
// Fetch Errors
// =============================================================================

/// Errors that can occur while fetching an override document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The URL is unparsable or does not use `http`/`https`.
    ///
    /// Raised before any network call is made.
    #[error("override URL '{url}' rejected: {reason}")]
    InvalidScheme {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Transport-level failure (connection, TLS, non-success status).
    #[error("network error fetching '{url}': {reason}")]
    Network {
        /// The requested URL.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// The fetch did not complete within its deadline.
    #[error("fetching '{url}' timed out after {timeout:?}")]
    Timeout {
        /// The requested URL.
        url: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The response body is not a JSON mapping.
    #[error("malformed override document from '{url}': {reason}")]
    Malformed {
        /// The requested URL.
        url: String,
        /// What was wrong with the body.
        reason: String,
    },
}

impl FetchError {
    /// Creates a network error.
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a malformed-document error.
    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a rejected-URL error.
    pub fn invalid_scheme(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidScheme {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Short classification label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidScheme { .. } => "invalid_scheme",
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
            Self::Malformed { .. } => "malformed",
        }
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

// =============================================================================
// Store Errors
// =============================================================================

/// Errors raised by an [`OverrideStore`](crate::OverrideStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored bytes could not be read back as an override document.
    ///
    /// Usually data written by a previous schema version or another program.
    #[error("corrupt persistent entry for '{key}': {reason}")]
    Corrupt {
        /// The configuration key.
        key: String,
        /// What was wrong with the entry.
        reason: String,
    },

    /// Underlying storage I/O failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document could not be serialized.
    #[error("failed to serialize override document: {0}")]
    Serialize(String),
}

impl StoreError {
    /// Creates a corrupt-entry error.
    pub fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Catalog Errors
// =============================================================================

/// Errors raised while building or validating a [`DefaultCatalog`](crate::DefaultCatalog).
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A recognized key has no default value.
    #[error("no default catalog entry for known key '{0}'")]
    MissingDefault(String),

    /// The catalog source is not a mapping of key to value.
    #[error("default catalog must be a mapping of key to value, got {0}")]
    NotAMapping(&'static str),

    /// The catalog source is not valid JSON.
    #[error("failed to parse default catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
