//! Configuration for the Strata runtime.
//!
//! Layered loading of resolver, store, transport and logging settings from
//! files, `STRATA_*` environment variables and programmatic values.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, ResolverConfig, SpanEventConfig,
    StrataConfig,
};
pub use validation::validate_config;
