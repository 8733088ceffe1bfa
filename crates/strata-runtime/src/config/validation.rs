//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, ResolverConfig, StrataConfig};
use strata_store::{StoreConfig, StoreKind};

/// Validates the entire configuration.
pub fn validate_config(config: &StrataConfig) -> ConfigResult<()> {
    validate_resolver_config(&config.resolver)?;
    validate_store_config(&config.store)?;
    validate_logging_config(&config.logging)?;

    if config.transport.max_body_bytes == 0 {
        return Err(ConfigError::validation(
            "transport.max_body_bytes must be greater than 0",
        ));
    }

    Ok(())
}

/// Validates resolver settings.
pub fn validate_resolver_config(resolver: &ResolverConfig) -> ConfigResult<()> {
    if resolver.fetch_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "resolver.fetch_timeout_ms must be greater than 0",
        ));
    }

    if resolver.refresh_interval_secs == 0 {
        return Err(ConfigError::validation(
            "resolver.refresh_interval_secs must be greater than 0",
        ));
    }

    if resolver.override_field.trim().is_empty() {
        return Err(ConfigError::missing_field("resolver.override_field"));
    }

    if resolver.fallback_context.is_empty() {
        return Err(ConfigError::missing_field("resolver.fallback_context"));
    }

    Ok(())
}

fn validate_store_config(store: &StoreConfig) -> ConfigResult<()> {
    if store.kind == StoreKind::File && store.resolved_dir().is_none() {
        return Err(ConfigError::missing_field("store.dir"));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}
