//! # Strata Runtime
//!
//! Resolution orchestration for the Strata configuration resolver.
//!
//! This crate wires the contracts of `strata-core` into a working resolver:
//!
//! - [`ConfigManager`]: layered, cached, never-failing `resolve`
//! - Background override refresh, one in flight per key and at most one
//!   per refresh interval, cancelled on [`ConfigManager::shutdown`]
//! - [`config`]: figment-based loading of [`StrataConfig`]
//! - [`logging`]: `tracing-subscriber` setup from [`LoggingConfig`](config::LoggingConfig)
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `http-client`: build an HTTP transport from configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod refresh;
pub mod stats;

pub use config::{ConfigLoader, ResolverConfig, StrataConfig, load_config, validate_config};
pub use error::{RefreshError, ResolverError, ResolverResult};
pub use manager::{ConfigManager, ConfigManagerBuilder, RefreshOutcome, RefreshReport};
pub use stats::ResolverStats;
