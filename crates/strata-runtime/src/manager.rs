//! The resolution orchestrator.
//!
//! [`ConfigManager`] answers `resolve(key, context)` by layering the
//! default catalog, the remote baseline and the persisted override document,
//! and caches the merged result per key and context.
//!
//! # Resolution
//!
//! ```text
//! resolve(key, ctx)
//!   ├─ cache hit ───────────────────────────────► cached value
//!   └─ miss
//!       ├─ default   = catalog[key]
//!       ├─ remote    = source.get_raw(key)        (failure → absent)
//!       ├─ url       = remote.configUrl           (stripped from remote)
//!       ├─ document  = store.get(key)             (corrupt → absent)
//!       ├─ schedule background refresh of url     (never awaited)
//!       └─ merge(default, remote, document) scoped to ctx → cache
//! ```
//!
//! Resolution is synchronous and never waits on the network. The first
//! resolution after a new override URL appears is served without that
//! document; the background refresh persists it and evicts the key, so a
//! later resolution picks it up.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use strata_runtime::ConfigManager;
//!
//! let manager = ConfigManager::builder()
//!     .catalog(DefaultCatalog::from_json_str(DEFAULTS)?)
//!     .remote_source(Arc::new(remote))
//!     .override_store(Arc::new(store))
//!     .transport(Arc::new(HttpOverrideTransport::new()?))
//!     .build()?;
//!
//! let flags = manager.resolve("feature_flags", None);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use strata_core::url::Url;
use strata_core::{
    CacheKey, ConfigValue, Context, DefaultCatalog, MemoryOverrideStore, OverrideFetcher,
    OverrideStore, OverrideTransport, RemoteSource, StoreError, merge, parse_override_url,
};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::cache::ResolvedCache;
use crate::config::StrataConfig;
use crate::config::schema::ResolverConfig;
use crate::config::validation::validate_resolver_config;
use crate::error::{RefreshError, ResolverError, ResolverResult};
use crate::refresh::RefreshTracker;
use crate::stats::{ResolverStats, StatsCounters};

/// Result of refreshing one key's override document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new document was stored and `evicted` cache entries were dropped.
    Updated { evicted: usize },
    /// The fetched document equals the stored one.
    Unchanged,
    /// The remote entry carries no override URL.
    NoOverride,
}

/// Per-key results of [`ConfigManager::refresh`].
#[derive(Debug, Default)]
pub struct RefreshReport {
    results: BTreeMap<String, Result<RefreshOutcome, RefreshError>>,
}

impl RefreshReport {
    pub fn get(&self, key: &str) -> Option<&Result<RefreshOutcome, RefreshError>> {
        self.results.get(key)
    }

    /// True when no key failed.
    pub fn is_success(&self) -> bool {
        self.results.values().all(Result::is_ok)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &RefreshError)> {
        self.results
            .iter()
            .filter_map(|(key, result)| result.as_ref().err().map(|e| (key.as_str(), e)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Result<RefreshOutcome, RefreshError>)> {
        self.results.iter().map(|(key, result)| (key.as_str(), result))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl fmt::Display for RefreshReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let updated = self
            .results
            .values()
            .filter(|r| matches!(r, Ok(RefreshOutcome::Updated { .. })))
            .count();
        let failed = self.results.values().filter(|r| r.is_err()).count();
        write!(
            f,
            "{} keys refreshed ({} updated, {} unchanged, {} failed)",
            self.results.len(),
            updated,
            self.results.len() - updated - failed,
            failed
        )
    }
}

/// Remote entry of one key, split into its baseline and override URL.
#[derive(Default)]
struct RemoteLayer {
    baseline: Option<ConfigValue>,
    override_url: Option<String>,
}

struct Inner {
    catalog: DefaultCatalog,
    remote: Arc<dyn RemoteSource>,
    store: Arc<dyn OverrideStore>,
    fetcher: Option<OverrideFetcher>,
    settings: ResolverConfig,
    cache: ResolvedCache,
    refresh: Arc<RefreshTracker>,
    stats: StatsCounters,
    runtime: Option<Handle>,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl Inner {
    fn remote_layer(&self, key: &str) -> RemoteLayer {
        let raw = match self.remote.get_raw(key) {
            Ok(raw) => raw,
            Err(e) => {
                self.stats.record_source_failure();
                warn!(
                    key = %key,
                    source = %self.remote.name(),
                    error = %e,
                    "Remote source failed, resolving without remote baseline"
                );
                None
            }
        };
        let Some(raw) = raw else {
            return RemoteLayer::default();
        };

        let kind = raw.kind();
        let ConfigValue::Map(mut entry) = raw else {
            self.stats.record_source_failure();
            warn!(key = %key, kind = %kind.as_str(), "Remote entry is not a mapping, ignoring it");
            return RemoteLayer::default();
        };

        let override_url = match entry.remove(&self.settings.override_field) {
            Some(ConfigValue::String(url)) => Some(url),
            Some(other) => {
                warn!(
                    key = %key,
                    field = %self.settings.override_field,
                    kind = %other.kind().as_str(),
                    "Override URL is not a string, ignoring it"
                );
                None
            }
            None => None,
        };

        // An entry that only carried the override URL has no baseline.
        let baseline = if entry.is_empty() && override_url.is_some() {
            None
        } else {
            Some(ConfigValue::Map(entry))
        };

        RemoteLayer {
            baseline,
            override_url,
        }
    }

    fn stored_document(&self, key: &str) -> Option<ConfigValue> {
        match self.store.get(key) {
            Ok(document) => document,
            Err(e @ StoreError::Corrupt { .. }) => {
                self.stats.record_store_corruption();
                warn!(key = %key, store = %self.store.name(), error = %e, "Ignoring corrupt override document");
                None
            }
            Err(e) => {
                warn!(key = %key, store = %self.store.name(), error = %e, "Failed to read override store");
                None
            }
        }
    }

    /// Fetches `url` and persists the document if it changed.
    ///
    /// The store is written before the cache is invalidated, so a resolution
    /// racing with this refresh either misses the new document and is kept
    /// out of the cache by the epoch bump, or reads it.
    async fn refresh_override(
        &self,
        key: &str,
        fetcher: &OverrideFetcher,
        url: &Url,
    ) -> Result<RefreshOutcome, RefreshError> {
        let document = match fetcher.fetch_url(url).await {
            Ok(document) => document,
            Err(e) => {
                self.stats.record_fetch_failure();
                return Err(e.into());
            }
        };

        if self.stored_document(key).as_ref() == Some(&document) {
            trace!(key = %key, "Override document unchanged");
            return Ok(RefreshOutcome::Unchanged);
        }

        if let Err(e) = self.store.set(key, &document) {
            self.stats.record_store_write_failure();
            warn!(key = %key, store = %self.store.name(), error = %e, "Failed to persist override document");
            return Err(e.into());
        }
        let evicted = self.cache.invalidate_key(key);
        self.stats.record_override_updated();
        info!(key = %key, url = %url, evicted, "Override document updated");

        Ok(RefreshOutcome::Updated { evicted })
    }
}

/// Layer selection for a context. No context means the whole layer.
fn scoped<'a>(
    layer: Option<&'a ConfigValue>,
    context: Option<&Context>,
    fallback: &str,
) -> Option<&'a ConfigValue> {
    match context {
        None => layer,
        Some(ctx) => layer.and_then(|l| ctx.select(l, fallback)),
    }
}

/// Resolves configuration keys against defaults, remote baseline and
/// override documents.
///
/// Cloning is cheap; clones share the cache, the store and background tasks.
#[derive(Clone)]
pub struct ConfigManager {
    inner: Arc<Inner>,
}

impl ConfigManager {
    pub fn builder() -> ConfigManagerBuilder {
        ConfigManagerBuilder::new()
    }

    /// Builds a manager from loaded configuration.
    ///
    /// Opens the configured store and, with the `http-client` feature, an
    /// HTTP transport.
    pub fn from_config(
        config: &StrataConfig,
        catalog: DefaultCatalog,
        remote: Arc<dyn RemoteSource>,
    ) -> ResolverResult<Self> {
        Self::builder()
            .catalog(catalog)
            .remote_source(remote)
            .with_config(config)?
            .build()
    }

    /// Resolves `key`, optionally scoped to `context`.
    ///
    /// Never fails. When every layer is absent the result is
    /// [`ConfigValue::Null`].
    pub fn resolve(&self, key: &str, context: Option<&Context>) -> ConfigValue {
        (*self.resolve_shared(key, context)).clone()
    }

    /// Resolves `key` within `dimension = value`.
    pub fn resolve_in(&self, key: &str, dimension: &str, value: &str) -> ConfigValue {
        self.resolve(key, Some(&Context::new(dimension, value)))
    }

    /// Resolves `key` and deserializes the result.
    pub fn resolve_as<T: DeserializeOwned>(
        &self,
        key: &str,
        context: Option<&Context>,
    ) -> Result<T, serde_json::Error> {
        let value = self.resolve_shared(key, context);
        serde_json::from_value(serde_json::Value::from((*value).clone()))
    }

    /// Like [`resolve`](Self::resolve), sharing the cached value instead of
    /// cloning it.
    pub fn resolve_shared(&self, key: &str, context: Option<&Context>) -> Arc<ConfigValue> {
        let inner = &self.inner;
        let cache_key = CacheKey::new(key, context.cloned());

        if let Some(hit) = inner.cache.get(&cache_key) {
            inner.stats.record_hit();
            trace!(cache_key = %cache_key, "Cache hit");
            return hit;
        }
        inner.stats.record_miss();

        let epoch = inner.cache.epoch(key);
        let remote = inner.remote_layer(key);
        let document = remote
            .override_url
            .as_deref()
            .and_then(|url| self.override_layer(key, url));

        let fallback = inner.settings.fallback_context.as_str();
        let resolved = merge(
            scoped(inner.catalog.get(key), context, fallback),
            scoped(remote.baseline.as_ref(), context, fallback),
            scoped(document.as_ref(), context, fallback),
        )
        .unwrap_or_default();

        let resolved = Arc::new(resolved);
        if !inner
            .cache
            .insert_if_current(cache_key.clone(), Arc::clone(&resolved), epoch)
        {
            debug!(cache_key = %cache_key, "Cache invalidated during resolution, result not cached");
        }

        debug!(
            cache_key = %cache_key,
            has_remote = remote.baseline.is_some(),
            has_override = document.is_some(),
            "Resolved configuration"
        );
        resolved
    }

    /// Reads the persisted override document and schedules its refresh.
    fn override_layer(&self, key: &str, raw_url: &str) -> Option<ConfigValue> {
        let url = match parse_override_url(raw_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(key = %key, error = %e, "Override URL rejected, skipping override layer");
                return None;
            }
        };

        let document = self.inner.stored_document(key);
        self.schedule_refresh(key, url);
        document
    }

    fn schedule_refresh(&self, key: &str, url: Url) {
        let inner = &self.inner;
        let Some(fetcher) = inner.fetcher.clone() else {
            trace!(key = %key, "No override transport, skipping refresh");
            return;
        };
        if inner.shutdown.is_cancelled() {
            return;
        }
        let Some(handle) = inner.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            debug!(key = %key, "No async runtime available, skipping override refresh");
            return;
        };
        let Some(guard) = inner.refresh.try_begin(key) else {
            trace!(key = %key, "Override refresh in flight or not yet due");
            return;
        };

        inner.stats.record_fetch_started();
        debug!(key = %key, url = %url, "Scheduling background override refresh");

        let task_inner = Arc::clone(inner);
        inner.tasks.spawn_on(
            async move {
                let key = guard.key().to_string();
                tokio::select! {
                    _ = task_inner.shutdown.cancelled() => {
                        debug!(key = %key, "Background override refresh cancelled");
                    }
                    result = task_inner.refresh_override(&key, &fetcher, &url) => match result {
                        Ok(outcome) => {
                            debug!(key = %key, outcome = ?outcome, "Background override refresh finished");
                        }
                        Err(e) => {
                            warn!(
                                key = %key,
                                url = %url,
                                error = %e,
                                "Background override refresh failed, keeping stored document"
                            );
                        }
                    },
                }
                drop(guard);
            },
            &handle,
        );
    }

    /// Re-fetches override documents now, ignoring the refresh interval.
    ///
    /// With `Some(key)` only that key is refreshed. With `None` every key of
    /// the default catalog and every key an override URL has been seen for
    /// is refreshed, concurrently; keys whose remote entry carries no
    /// override URL are left out of the report. Cache entries of every
    /// successfully refreshed key are evicted.
    pub async fn refresh(&self, key: Option<&str>) -> RefreshReport {
        let (keys, explicit) = match key {
            Some(key) => (vec![key.to_string()], true),
            None => (self.refresh_candidates(), false),
        };

        let results = join_all(keys.into_iter().map(|key| async move {
            let result = self.refresh_key(&key, explicit).await;
            (key, result)
        }))
        .await;

        let report = RefreshReport {
            results: results
                .into_iter()
                .filter_map(|(key, result)| result.map(|r| (key, r)))
                .collect(),
        };

        info!(%report, "Manual override refresh finished");
        for (key, error) in report.failures() {
            warn!(key = %key, error = %error, "Override refresh failed");
        }
        report
    }

    async fn refresh_key(
        &self,
        key: &str,
        explicit: bool,
    ) -> Option<Result<RefreshOutcome, RefreshError>> {
        let inner = &self.inner;

        let raw = match inner.remote.get_raw(key) {
            Ok(raw) => raw,
            Err(e) => {
                inner.stats.record_source_failure();
                return Some(Err(e.into()));
            }
        };
        let raw_url = raw
            .as_ref()
            .and_then(|entry| entry.get(&inner.settings.override_field))
            .and_then(ConfigValue::as_str);

        let Some(raw_url) = raw_url else {
            if !explicit {
                return None;
            }
            inner.cache.invalidate_key(key);
            return Some(Ok(RefreshOutcome::NoOverride));
        };

        let url = match parse_override_url(raw_url) {
            Ok(url) => url,
            Err(e) => return Some(Err(e.into())),
        };
        let Some(fetcher) = &inner.fetcher else {
            return Some(Err(RefreshError::NoTransport));
        };

        inner.refresh.mark_attempt(key);
        inner.stats.record_fetch_started();
        let result = inner.refresh_override(key, fetcher, &url).await;
        if let Ok(RefreshOutcome::Unchanged) = result {
            inner.cache.invalidate_key(key);
        }
        Some(result)
    }

    fn refresh_candidates(&self) -> Vec<String> {
        let mut keys: BTreeSet<String> = self.inner.catalog.keys().map(str::to_string).collect();
        keys.extend(self.inner.refresh.keys());
        keys.into_iter().collect()
    }

    /// Drops every resolved value and every persisted override document.
    ///
    /// Idempotent. The next resolution of each key recomputes from the
    /// layers, and override documents are rebuilt by the next fetch cycle.
    pub fn clear_cache(&self) {
        let inner = &self.inner;

        // Store before cache; see `Inner::refresh_override`.
        if let Err(e) = inner.store.clear(None) {
            warn!(store = %inner.store.name(), error = %e, "Failed to clear override store");
        }
        let evicted = inner.cache.clear();
        inner.refresh.reset_cycle();

        info!(evicted, "Cleared resolved values and override documents");
    }

    /// Evicts the resolved values of `key` without touching the store.
    pub fn invalidate(&self, key: &str) -> usize {
        let evicted = self.inner.cache.invalidate_key(key);
        debug!(key = %key, evicted, "Invalidated cached values");
        evicted
    }

    pub fn stats(&self) -> ResolverStats {
        self.inner.stats.snapshot(self.inner.cache.len())
    }

    pub fn cached_len(&self) -> usize {
        self.inner.cache.len()
    }

    pub fn is_refresh_in_flight(&self, key: &str) -> bool {
        self.inner.refresh.is_in_flight(key)
    }

    /// Keys of the default catalog.
    pub fn known_keys(&self) -> impl Iterator<Item = &str> {
        self.inner.catalog.keys()
    }

    pub fn settings(&self) -> &ResolverConfig {
        &self.inner.settings
    }

    /// Waits for every background refresh spawned so far to finish.
    pub async fn drain_refreshes(&self) {
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.tasks.reopen();
    }

    /// Cancels background refreshes and waits for them to stop.
    ///
    /// Resolution keeps working afterwards, without scheduling refreshes.
    pub async fn shutdown(&self) {
        info!("Shutting down config manager");
        self.inner.shutdown.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
    }
}

impl fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigManager")
            .field("keys", &self.inner.catalog.len())
            .field("remote", &self.inner.remote.name())
            .field("store", &self.inner.store.name())
            .field("cached", &self.inner.cache.len())
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Assembles a [`ConfigManager`].
///
/// A remote source is required. The store defaults to a
/// [`MemoryOverrideStore`]; without a transport, override documents are
/// only served from the store and never refreshed.
#[derive(Default)]
pub struct ConfigManagerBuilder {
    catalog: DefaultCatalog,
    required_keys: Vec<String>,
    remote: Option<Arc<dyn RemoteSource>>,
    store: Option<Arc<dyn OverrideStore>>,
    transport: Option<Arc<dyn OverrideTransport>>,
    settings: ResolverConfig,
    runtime: Option<Handle>,
}

impl ConfigManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog(mut self, catalog: DefaultCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Keys the catalog must define; `build` fails otherwise.
    pub fn require_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.required_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn remote_source(mut self, source: Arc<dyn RemoteSource>) -> Self {
        self.remote = Some(source);
        self
    }

    pub fn override_store(mut self, store: Arc<dyn OverrideStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn OverrideTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn settings(mut self, settings: ResolverConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Runtime that background refreshes are spawned on.
    ///
    /// Defaults to the runtime current at `build`, if any.
    pub fn runtime_handle(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Applies resolver settings and opens the configured store and transport.
    ///
    /// Components set explicitly beforehand are kept.
    pub fn with_config(mut self, config: &StrataConfig) -> ResolverResult<Self> {
        self.settings = config.resolver.clone();

        if self.store.is_none() {
            self.store = Some(strata_store::open_store(&config.store)?);
        }

        #[cfg(feature = "http-client")]
        if self.transport.is_none() {
            let transport = strata_transport::HttpOverrideTransport::with_config(&config.transport)
                .map_err(|e| ResolverError::Transport(e.to_string()))?;
            self.transport = Some(Arc::new(transport));
        }

        Ok(self)
    }

    pub fn build(self) -> ResolverResult<ConfigManager> {
        validate_resolver_config(&self.settings)?;
        self.catalog.require(&self.required_keys)?;

        let remote = self
            .remote
            .ok_or(ResolverError::MissingComponent("remote source"))?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryOverrideStore::new()));
        let fetcher = self
            .transport
            .map(|transport| OverrideFetcher::new(transport, self.settings.fetch_timeout()));
        if fetcher.is_none() {
            warn!("No override transport configured, override documents will not be refreshed");
        }

        let runtime = self.runtime.or_else(|| Handle::try_current().ok());

        info!(
            keys = self.catalog.len(),
            remote = %remote.name(),
            store = %store.name(),
            transport = fetcher.as_ref().map(|f| f.transport_name()).unwrap_or("none"),
            fetch_timeout_ms = self.settings.fetch_timeout_ms,
            refresh_interval_secs = self.settings.refresh_interval_secs,
            "Config manager initialized"
        );

        Ok(ConfigManager {
            inner: Arc::new(Inner {
                refresh: Arc::new(RefreshTracker::new(self.settings.refresh_interval())),
                catalog: self.catalog,
                remote,
                store,
                fetcher,
                settings: self.settings,
                cache: ResolvedCache::new(),
                stats: StatsCounters::default(),
                runtime,
                tasks: TaskTracker::new(),
                shutdown: CancellationToken::new(),
            }),
        })
    }
}
