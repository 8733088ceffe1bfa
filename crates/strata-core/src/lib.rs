//! # Strata Core
//!
//! The building blocks of the Strata configuration resolver.
//!
//! A configuration key is resolved by layering three sources, lowest
//! precedence first:
//!
//! ```text
//! ┌──────────────────────┐
//! │  Override document   │  fetched from the `configUrl` of the remote entry
//! ├──────────────────────┤
//! │  Remote baseline     │  live snapshot from a remote-config service
//! ├──────────────────────┤
//! │  Default catalog     │  compiled into the binary, always present
//! └──────────────────────┘
//! ```
//!
//! This crate owns the value model and the merge policy, and defines the
//! contracts the orchestrator in `strata-runtime` needs from its
//! collaborators.
//!
//! ## Foundation Layer
//!
//! - **Values**: the tagged [`ConfigValue`] every layer is expressed in
//! - **Merging**: the recursive precedence merge ([`merge`], [`overlay`])
//! - **Keys**: [`Context`] scoping and composite [`CacheKey`]s
//! - **Defaults**: the immutable [`DefaultCatalog`]
//!
//! ## Integration Layer
//!
//! - **Remote baseline**: [`RemoteSource`] and the [`StaticRemoteSource`] snapshot
//! - **Persistent overrides**: [`OverrideStore`] and [`MemoryOverrideStore`]
//! - **Override fetching**: [`OverrideTransport`] and the [`OverrideFetcher`]
//!   pipeline (scheme check, timeout, parse, shape validation)
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use strata_core::{ConfigValue, merge};
//!
//! let default = ConfigValue::from(json!({"a": 1, "b": 2}));
//! let remote = ConfigValue::from(json!({"a": 2}));
//! let document = ConfigValue::from(json!({"a": 3}));
//!
//! let resolved = merge(Some(&default), Some(&remote), Some(&document));
//! assert_eq!(resolved, Some(ConfigValue::from(json!({"a": 3, "b": 2}))));
//! ```

pub mod error;
pub mod foundation;
pub mod integration;

pub use error::{
    CatalogError, CatalogResult, FetchError, FetchResult, SourceError, SourceResult, StoreError,
    StoreResult,
};
pub use foundation::catalog::DefaultCatalog;
pub use foundation::key::{CacheKey, Context};
pub use foundation::merge::{merge, merge_layers, overlay};
pub use foundation::value::{ConfigMap, ConfigValue, ValueKind};
pub use integration::fetch::{
    MemoryTransport, OverrideFetcher, OverrideTransport, parse_override_document,
    parse_override_url,
};
pub use integration::source::{RemoteSource, StaticRemoteSource};
pub use integration::store::{MemoryOverrideStore, OverrideStore};

pub use url;

/// Reserved field of a remote entry that names the override document URL.
pub const DEFAULT_OVERRIDE_FIELD: &str = "configUrl";
