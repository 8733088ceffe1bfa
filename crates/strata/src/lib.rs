//! # Strata
//!
//! Layered configuration resolution for services that must keep working
//! when their remote configuration does not.
//!
//! ## Overview
//!
//! Every configuration key resolves to the merge of three layers:
//!
//! ```text
//!   default catalog ──┐
//!   remote baseline ──┼──▶ merge (scoped to a context) ──▶ cache ──▶ value
//!   override document ┘        ▲
//!                              │ persisted, refreshed in the background
//!                        override store ◀── fetch(configUrl)
//! ```
//!
//! - **Default catalog**: compiled in, always present
//! - **Remote baseline**: a live snapshot from a remote-config service
//! - **Override document**: fetched from the URL the remote entry names,
//!   persisted so it survives restarts and outages
//!
//! Resolution never fails and never waits on the network. Any layer that is
//! unavailable simply drops out of the merge.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use strata::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     strata::runtime::logging::init_from_config(&config.logging);
//!
//!     let manager = ConfigManager::from_config(
//!         &config,
//!         DefaultCatalog::from_json_str(include_str!("defaults.json"))?,
//!         Arc::new(my_remote_source),
//!     )?;
//!
//!     let surge = manager.resolve_in("surge_pricing", "city", "bangalore");
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `http-client` *(default)*: HTTP(S) override transport
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use strata_core as core;
pub use strata_runtime as runtime;
pub use strata_store as store;
pub use strata_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use strata::prelude::*;
/// ```
pub mod prelude {
    // Orchestrator - main entry point
    pub use strata_runtime::{
        ConfigManager, ConfigManagerBuilder, RefreshOutcome, RefreshReport, ResolverConfig,
        StrataConfig, load_config,
    };

    // Value model
    pub use strata_core::{ConfigValue, Context, DefaultCatalog, merge};

    // Collaborator contracts and in-process implementations
    pub use strata_core::{
        MemoryOverrideStore, OverrideStore, OverrideTransport, RemoteSource, StaticRemoteSource,
    };
    pub use strata_store::FileOverrideStore;

    #[cfg(feature = "http-client")]
    pub use strata_transport::HttpOverrideTransport;
}
