//! Resolve CLI Example
//!
//! Resolves one configuration key the way a service embedding Strata would:
//! built-in defaults, a remote snapshot read from a JSON file, and override
//! documents fetched over HTTP and persisted in the configured store.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package resolve-cli -- feature_flags --remote remote.json
//! cargo run --package resolve-cli -- surge_pricing --context city=bangalore --refresh
//! ```
//!
//! The remote snapshot maps keys to entries; an entry may name an override
//! document with `configUrl`:
//!
//! ```json
//! { "feature_flags": { "dark_mode": true, "configUrl": "https://cfg.example.com/flags.json" } }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use strata::prelude::*;
use strata::runtime::config::ConfigLoader;
use strata::runtime::logging;
use tracing::{info, warn};

const BUILTIN_DEFAULTS: &str = include_str!("defaults.json");

#[derive(Parser, Debug)]
#[command(version, about = "Resolve a Strata configuration key")]
struct Args {
    /// Configuration key to resolve.
    key: String,

    /// Context as `dimension=value`, e.g. `city=bangalore`.
    #[arg(long, value_parser = parse_context)]
    context: Option<Context>,

    /// JSON file with the remote snapshot.
    #[arg(long)]
    remote: Option<PathBuf>,

    /// JSON file with default values, replacing the built-in catalog.
    #[arg(long)]
    defaults: Option<PathBuf>,

    /// Configuration file, instead of searching for `strata.toml`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fetch the override document before resolving.
    #[arg(long)]
    refresh: bool,
}

fn parse_context(raw: &str) -> Result<Context, String> {
    match raw.split_once('=') {
        Some((dimension, value)) if !dimension.is_empty() && !value.is_empty() => {
            Ok(Context::new(dimension, value))
        }
        _ => Err(format!("expected `dimension=value`, got `{raw}`")),
    }
}

fn read_catalog(path: Option<&PathBuf>) -> Result<DefaultCatalog> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading defaults from {}", path.display()))?,
        None => BUILTIN_DEFAULTS.to_string(),
    };
    Ok(DefaultCatalog::from_json_str(&text)?)
}

fn read_remote(path: Option<&PathBuf>) -> Result<StaticRemoteSource> {
    let Some(path) = path else {
        return Ok(StaticRemoteSource::new("empty"));
    };
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading remote snapshot from {}", path.display()))?;
    let snapshot = ConfigValue::from_json_slice(&bytes)
        .with_context(|| format!("parsing remote snapshot {}", path.display()))?;
    Ok(StaticRemoteSource::from_snapshot(
        path.display().to_string(),
        snapshot,
    )?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::new().file(path),
        None => ConfigLoader::new(),
    };
    let config = loader.load_validated()?;
    logging::init_from_config(&config.logging);

    let catalog = read_catalog(args.defaults.as_ref())?;
    if !catalog.contains(&args.key) {
        warn!(key = %args.key, "Key has no default; resolution may yield null");
    }
    let remote = read_remote(args.remote.as_ref())?;

    let manager = ConfigManager::from_config(&config, catalog, Arc::new(remote))?;

    if args.refresh {
        let report = manager.refresh(Some(&args.key)).await;
        info!(%report, "Refreshed override document");
        for (key, error) in report.failures() {
            eprintln!("refresh of {key} failed: {error}");
        }
    }

    let value = manager.resolve(&args.key, args.context.as_ref());
    println!("{}", value.to_json_pretty()?);

    info!(stats = %manager.stats(), "Done");
    manager.shutdown().await;
    Ok(())
}
