use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use strata_core::{
    CatalogError, ConfigValue, Context, DefaultCatalog, FetchError, MemoryOverrideStore,
    MemoryTransport, OverrideStore, StaticRemoteSource,
};
use strata_runtime::{
    ConfigManager, RefreshError, RefreshOutcome, ResolverConfig, ResolverError, StrataConfig,
};

const FLAGS_URL: &str = "https://cfg.example.com/flags.json";

fn value(json: Value) -> ConfigValue {
    ConfigValue::from(json)
}

struct Harness {
    manager: ConfigManager,
    remote: Arc<StaticRemoteSource>,
    store: Arc<MemoryOverrideStore>,
    transport: Arc<MemoryTransport>,
}

fn harness(defaults: Value, remote: Value) -> Harness {
    harness_with(defaults, remote, ResolverConfig::default())
}

fn harness_with(defaults: Value, remote: Value, settings: ResolverConfig) -> Harness {
    let remote = Arc::new(StaticRemoteSource::from_snapshot("test-remote", value(remote)).unwrap());
    let store = Arc::new(MemoryOverrideStore::new());
    let transport = Arc::new(MemoryTransport::new());

    let manager = ConfigManager::builder()
        .catalog(DefaultCatalog::from_value(value(defaults)).unwrap())
        .remote_source(remote.clone())
        .override_store(store.clone())
        .transport(transport.clone())
        .settings(settings)
        .build()
        .unwrap();

    Harness {
        manager,
        remote,
        store,
        transport,
    }
}

// =============================================================================
// Layering
// =============================================================================

#[tokio::test]
async fn test_override_beats_remote_beats_default() {
    let h = harness(
        json!({"flags": {"a": 1, "b": 2}}),
        json!({"flags": {"a": 2, "configUrl": FLAGS_URL}}),
    );
    h.store.set("flags", &value(json!({"a": 3}))).unwrap();
    h.transport.respond_json(FLAGS_URL, &value(json!({"a": 3})));

    assert_eq!(
        h.manager.resolve("flags", None),
        value(json!({"a": 3, "b": 2}))
    );
}

#[tokio::test]
async fn test_partial_override_keeps_siblings() {
    let h = harness(
        json!({"payments": {"x": {"p": 1, "q": 2}}}),
        json!({"payments": {"configUrl": FLAGS_URL}}),
    );
    h.store
        .set("payments", &value(json!({"x": {"p": 9}})))
        .unwrap();

    assert_eq!(
        h.manager.resolve("payments", None),
        value(json!({"x": {"p": 9, "q": 2}}))
    );
}

#[tokio::test]
async fn test_list_replaces_mapping_wholesale() {
    let h = harness(
        json!({"themes": {"x": {"p": 1}}}),
        json!({"themes": {"x": [1, 2]}}),
    );

    assert_eq!(h.manager.resolve("themes", None), value(json!({"x": [1, 2]})));
}

#[tokio::test]
async fn test_override_field_is_stripped() {
    let h = harness(
        json!({"flags": {"a": 1}}),
        json!({"flags": {"b": 2, "configUrl": FLAGS_URL}}),
    );

    let resolved = h.manager.resolve("flags", None);
    assert_eq!(resolved, value(json!({"a": 1, "b": 2})));
    assert!(resolved.get("configUrl").is_none());
}

#[tokio::test]
async fn test_unknown_key_resolves_to_null() {
    let h = harness(json!({}), json!({}));
    assert_eq!(h.manager.resolve("absent", None), ConfigValue::Null);
}

#[tokio::test]
async fn test_resolve_as_typed_value() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Flags {
        dark_mode: bool,
        retries: u32,
    }

    let h = harness(
        json!({"flags": {"dark_mode": false, "retries": 3}}),
        json!({"flags": {"dark_mode": true}}),
    );

    let flags: Flags = h.manager.resolve_as("flags", None).unwrap();
    assert_eq!(
        flags,
        Flags {
            dark_mode: true,
            retries: 3
        }
    );
}

// =============================================================================
// Contexts
// =============================================================================

#[tokio::test]
async fn test_context_selects_per_layer_with_fallback() {
    let h = harness(
        json!({"surge": {"bangalore": {"factor": 1.5}, "default": {"factor": 1.0, "cap": 3}}}),
        json!({"surge": {"delhi": {"factor": 2.0}, "configUrl": FLAGS_URL}}),
    );

    // remote has no bangalore entry and no default entry, so it contributes nothing
    assert_eq!(
        h.manager.resolve_in("surge", "city", "bangalore"),
        value(json!({"factor": 1.5}))
    );
    // default layer falls back to its default entry
    assert_eq!(
        h.manager.resolve_in("surge", "city", "delhi"),
        value(json!({"factor": 2.0, "cap": 3}))
    );
}

#[tokio::test]
async fn test_contexts_are_cached_separately() {
    let h = harness(
        json!({"surge": {"bangalore": {"factor": 1.5}, "default": {"factor": 1.0}}}),
        json!({}),
    );
    let bangalore = Context::new("city", "bangalore");
    let delhi = Context::new("city", "delhi");

    h.manager.resolve("surge", Some(&bangalore));
    h.manager.resolve("surge", Some(&delhi));
    h.manager.resolve("surge", Some(&bangalore));

    assert_eq!(h.manager.cached_len(), 2);
    assert_eq!(h.remote.calls(), 2);
}

// =============================================================================
// Degradation
// =============================================================================

#[tokio::test]
async fn test_source_failure_returns_exactly_the_default() {
    let h = harness(
        json!({"flags": {"a": 1, "b": 2}}),
        json!({"flags": {"a": 2}}),
    );
    h.remote.set_available(false);

    assert_eq!(
        h.manager.resolve("flags", None),
        value(json!({"a": 1, "b": 2}))
    );
    assert_eq!(h.manager.stats().source_failures, 1);
}

#[tokio::test]
async fn test_non_mapping_remote_entry_is_ignored() {
    let h = harness(json!({"flags": {"a": 1}}), json!({"flags": "on"}));

    assert_eq!(h.manager.resolve("flags", None), value(json!({"a": 1})));
    assert_eq!(h.manager.stats().source_failures, 1);
}

#[tokio::test]
async fn test_corrupt_stored_document_is_ignored() {
    let h = harness(
        json!({"flags": {"a": 1}}),
        json!({"flags": {"configUrl": FLAGS_URL}}),
    );
    h.store.put_raw("flags", b"\x00legacy".to_vec());
    h.transport.fail(FLAGS_URL, FetchError::network(FLAGS_URL, "down"));

    assert_eq!(h.manager.resolve("flags", None), value(json!({"a": 1})));
    assert_eq!(h.manager.stats().store_corruptions, 1);
}

#[tokio::test]
async fn test_invalid_scheme_skips_override_layer() {
    let h = harness(
        json!({"flags": {"a": 1}}),
        json!({"flags": {"b": 2, "configUrl": "ftp://cfg.example.com/flags.json"}}),
    );

    assert_eq!(
        h.manager.resolve("flags", None),
        value(json!({"a": 1, "b": 2}))
    );
    h.manager.drain_refreshes().await;
    assert_eq!(h.transport.calls(), 0);
    assert_eq!(h.manager.stats().fetches_started, 0);
}

#[tokio::test]
async fn test_failed_refresh_keeps_stale_override() {
    let h = harness(
        json!({"flags": {"a": 1}}),
        json!({"flags": {"configUrl": FLAGS_URL}}),
    );
    h.store.set("flags", &value(json!({"a": 3}))).unwrap();
    h.transport
        .fail(FLAGS_URL, FetchError::network(FLAGS_URL, "connection reset"));

    assert_eq!(h.manager.resolve("flags", None), value(json!({"a": 3})));
    h.manager.drain_refreshes().await;

    assert_eq!(h.transport.calls(), 1);
    assert_eq!(h.store.writes(), 1);
    assert_eq!(h.manager.stats().fetch_failures, 1);

    h.manager.invalidate("flags");
    assert_eq!(h.manager.resolve("flags", None), value(json!({"a": 3})));
}

#[tokio::test]
async fn test_malformed_document_is_discarded() {
    let h = harness(
        json!({"flags": {"flag": false, "other": 1}}),
        json!({"flags": {"configUrl": FLAGS_URL}}),
    );
    h.store.set("flags", &value(json!({"flag": true}))).unwrap();
    h.transport.respond(FLAGS_URL, "<html>502 Bad Gateway</html>");

    let report = h.manager.refresh(Some("flags")).await;
    assert!(matches!(
        report.get("flags"),
        Some(Err(RefreshError::Fetch(FetchError::Malformed { .. })))
    ));

    assert_eq!(h.store.writes(), 1);
    assert_eq!(
        h.manager.resolve("flags", None),
        value(json!({"flag": true, "other": 1}))
    );
}

#[tokio::test(start_paused = true)]
async fn test_fetch_timeout_abandons_refresh() {
    let h = harness(
        json!({"flags": {"a": 1}}),
        json!({"flags": {"configUrl": FLAGS_URL}}),
    );
    h.transport.respond_json(FLAGS_URL, &value(json!({"a": 3})));
    h.transport.delay(FLAGS_URL, Duration::from_secs(20));

    h.manager.resolve("flags", None);
    assert!(h.manager.is_refresh_in_flight("flags"));
    h.manager.drain_refreshes().await;

    assert!(!h.manager.is_refresh_in_flight("flags"));
    assert!(h.store.is_empty());
    assert_eq!(h.manager.stats().fetch_failures, 1);
}

// =============================================================================
// Caching and background refresh
// =============================================================================

#[tokio::test]
async fn test_cache_hit_reads_no_layer() {
    let h = harness(
        json!({"flags": {"a": 1}}),
        json!({"flags": {"a": 2, "configUrl": FLAGS_URL}}),
    );
    h.transport.respond_json(FLAGS_URL, &value(json!({"a": 2})));

    let first = h.manager.resolve_shared("flags", None);
    let remote_calls = h.remote.calls();
    let fetches = h.transport.calls();

    let second = h.manager.resolve_shared("flags", None);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(h.remote.calls(), remote_calls);
    assert_eq!(h.transport.calls(), fetches);

    let stats = h.manager.stats();
    assert_eq!((stats.cache_hits, stats.cache_misses), (1, 1));
}

#[tokio::test]
async fn test_background_refresh_is_picked_up_later() {
    let h = harness(
        json!({"flags": {"a": 1, "b": 2}}),
        json!({"flags": {"a": 2, "configUrl": FLAGS_URL}}),
    );
    h.transport.respond_json(FLAGS_URL, &value(json!({"a": 3})));

    // first resolution never waits for the network
    assert_eq!(
        h.manager.resolve("flags", None),
        value(json!({"a": 2, "b": 2}))
    );

    h.manager.drain_refreshes().await;
    assert_eq!(h.manager.cached_len(), 0);
    assert_eq!(
        h.manager.resolve("flags", None),
        value(json!({"a": 3, "b": 2}))
    );
    assert_eq!(h.manager.stats().overrides_updated, 1);
}

#[tokio::test]
async fn test_unchanged_document_keeps_cache() {
    let h = harness(
        json!({"flags": {"a": 1}}),
        json!({"flags": {"configUrl": FLAGS_URL}}),
    );
    h.store.set("flags", &value(json!({"a": 3}))).unwrap();
    h.transport.respond_json(FLAGS_URL, &value(json!({"a": 3})));

    h.manager.resolve("flags", None);
    h.manager.drain_refreshes().await;

    assert_eq!(h.manager.cached_len(), 1);
    assert_eq!(h.store.writes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_one_fetch_per_key_per_interval() {
    let h = harness(
        json!({"surge": {"default": {"factor": 1.0}}}),
        json!({"surge": {"configUrl": FLAGS_URL}}),
    );
    h.transport
        .respond_json(FLAGS_URL, &value(json!({"default": {"factor": 2.0}})));
    h.transport.delay(FLAGS_URL, Duration::from_millis(100));

    // distinct contexts all miss the cache while the fetch is pending
    for city in ["bangalore", "delhi", "mumbai", "pune"] {
        h.manager.resolve_in("surge", "city", city);
    }
    h.manager.drain_refreshes().await;
    assert_eq!(h.transport.calls(), 1);

    h.manager.invalidate("surge");
    h.manager.resolve("surge", None);
    h.manager.drain_refreshes().await;
    assert_eq!(h.transport.calls(), 1);

    tokio::time::advance(Duration::from_secs(301)).await;
    h.manager.invalidate("surge");
    h.manager.resolve("surge", None);
    h.manager.drain_refreshes().await;
    assert_eq!(h.transport.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_share_one_fetch() {
    let h = harness(
        json!({"surge": {"default": {"factor": 1.0}}}),
        json!({"surge": {"configUrl": FLAGS_URL}}),
    );
    h.transport
        .respond_json(FLAGS_URL, &value(json!({"default": {"factor": 2.0}})));
    h.transport.delay(FLAGS_URL, Duration::from_millis(50));

    std::thread::scope(|scope| {
        for i in 0..16 {
            let manager = h.manager.clone();
            scope.spawn(move || {
                let resolved = manager.resolve_in("surge", "city", &format!("city-{i}"));
                assert!(resolved.get("factor").is_some());
            });
        }
    });

    h.manager.drain_refreshes().await;
    assert_eq!(h.transport.calls(), 1);
    assert_eq!(h.store.writes(), 1);
}

#[tokio::test]
async fn test_changed_override_url_is_followed() {
    const THEMES_URL: &str = "https://cfg.example.com/themes-v2.json";
    let h = harness(
        json!({"flags": {"a": 1}}),
        json!({"flags": {"configUrl": FLAGS_URL}}),
    );
    h.transport.respond_json(FLAGS_URL, &value(json!({"a": 2})));
    h.transport.respond_json(THEMES_URL, &value(json!({"a": 3})));

    h.manager.resolve("flags", None);
    h.manager.drain_refreshes().await;

    h.remote
        .set("flags", value(json!({"configUrl": THEMES_URL})));
    let report = h.manager.refresh(Some("flags")).await;
    assert!(report.is_success());

    assert_eq!(h.manager.resolve("flags", None), value(json!({"a": 3})));
    assert_eq!(h.transport.calls_for(THEMES_URL), 1);
}

// =============================================================================
// Manual refresh and cache clearing
// =============================================================================

#[tokio::test]
async fn test_manual_refresh_single_key() {
    let h = harness(
        json!({"flags": {"a": 1}, "themes": {"dark": false}}),
        json!({"flags": {"configUrl": FLAGS_URL}}),
    );
    h.transport.respond_json(FLAGS_URL, &value(json!({"a": 3})));

    let report = h.manager.refresh(Some("flags")).await;
    assert!(matches!(
        report.get("flags"),
        Some(Ok(RefreshOutcome::Updated { .. }))
    ));
    assert_eq!(h.manager.resolve("flags", None), value(json!({"a": 3})));

    let report = h.manager.refresh(Some("themes")).await;
    assert!(matches!(
        report.get("themes"),
        Some(Ok(RefreshOutcome::NoOverride))
    ));
}

#[tokio::test]
async fn test_manual_refresh_ignores_interval() {
    let h = harness(
        json!({"flags": {"a": 1}}),
        json!({"flags": {"configUrl": FLAGS_URL}}),
    );
    h.transport.respond_json(FLAGS_URL, &value(json!({"a": 3})));

    h.manager.refresh(Some("flags")).await;
    h.manager.refresh(Some("flags")).await;

    assert_eq!(h.transport.calls(), 2);
    assert_eq!(h.store.writes(), 1);
}

#[tokio::test]
async fn test_refresh_all_reports_per_key() {
    const THEMES_URL: &str = "https://cfg.example.com/themes.json";
    let h = harness(
        json!({"flags": {"a": 1}, "themes": {"dark": false}, "limits": {"max": 5}}),
        json!({
            "flags": {"configUrl": FLAGS_URL},
            "themes": {"configUrl": THEMES_URL},
        }),
    );
    h.transport.respond_json(FLAGS_URL, &value(json!({"a": 3})));
    h.transport
        .fail(THEMES_URL, FetchError::network(THEMES_URL, "HTTP 503 error"));

    let report = h.manager.refresh(None).await;

    assert_eq!(report.len(), 2);
    assert!(!report.is_success());
    assert!(matches!(report.get("flags"), Some(Ok(_))));
    assert!(matches!(
        report.get("themes"),
        Some(Err(RefreshError::Fetch(FetchError::Network { .. })))
    ));
    assert!(report.get("limits").is_none());
    assert_eq!(report.failures().count(), 1);
}

#[tokio::test]
async fn test_refresh_with_unreachable_source() {
    let h = harness(
        json!({"flags": {"a": 1}}),
        json!({"flags": {"configUrl": FLAGS_URL}}),
    );
    h.remote.set_available(false);

    let report = h.manager.refresh(Some("flags")).await;
    assert!(matches!(report.get("flags"), Some(Err(RefreshError::Source(_)))));
    assert_eq!(h.transport.calls(), 0);
}

#[tokio::test]
async fn test_clear_cache_is_idempotent() {
    let h = harness(
        json!({"flags": {"a": 1}}),
        json!({"flags": {"configUrl": FLAGS_URL}}),
    );
    h.transport.respond_json(FLAGS_URL, &value(json!({"a": 3})));
    h.manager.refresh(Some("flags")).await;
    assert_eq!(h.manager.resolve("flags", None), value(json!({"a": 3})));

    h.manager.clear_cache();
    h.manager.clear_cache();

    assert_eq!(h.manager.cached_len(), 0);
    assert!(h.store.is_empty());

    let calls = h.remote.calls();
    assert_eq!(h.manager.resolve("flags", None), value(json!({"a": 1})));
    assert_eq!(h.remote.calls(), calls + 1);

    // the cleared store is rebuilt by the next fetch cycle
    h.manager.drain_refreshes().await;
    assert_eq!(h.manager.resolve("flags", None), value(json!({"a": 3})));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_refresh() {
    let h = harness(
        json!({"flags": {"a": 1}}),
        json!({"flags": {"configUrl": FLAGS_URL}}),
    );
    h.transport.respond_json(FLAGS_URL, &value(json!({"a": 3})));
    h.transport.delay(FLAGS_URL, Duration::from_secs(5));

    h.manager.resolve("flags", None);
    h.manager.shutdown().await;

    assert!(!h.manager.is_refresh_in_flight("flags"));
    assert!(h.store.is_empty());

    // resolution keeps working without scheduling refreshes
    h.manager.invalidate("flags");
    assert_eq!(h.manager.resolve("flags", None), value(json!({"a": 1})));
    assert_eq!(h.manager.stats().fetches_started, 1);
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_missing_default_fails_build() {
    let result = ConfigManager::builder()
        .catalog(DefaultCatalog::new().with_entry("flags", value(json!({}))))
        .remote_source(Arc::new(StaticRemoteSource::new("test-remote")))
        .require_keys(["flags", "themes"])
        .build();

    assert!(matches!(
        result,
        Err(ResolverError::Catalog(CatalogError::MissingDefault(ref key))) if key == "themes"
    ));
}

#[test]
fn test_missing_remote_source_fails_build() {
    let result = ConfigManager::builder().build();
    assert!(matches!(result, Err(ResolverError::MissingComponent(_))));
}

#[test]
fn test_invalid_settings_fail_build() {
    let result = ConfigManager::builder()
        .remote_source(Arc::new(StaticRemoteSource::new("test-remote")))
        .settings(ResolverConfig {
            fetch_timeout_ms: 0,
            ..Default::default()
        })
        .build();
    assert!(matches!(result, Err(ResolverError::Config(_))));
}

#[test]
fn test_resolves_without_async_runtime() {
    let h = harness(
        json!({"flags": {"a": 1}}),
        json!({"flags": {"b": 2, "configUrl": FLAGS_URL}}),
    );

    assert_eq!(
        h.manager.resolve("flags", None),
        value(json!({"a": 1, "b": 2}))
    );
    assert_eq!(h.manager.stats().fetches_started, 0);
}

#[tokio::test]
async fn test_custom_override_field() {
    let h = harness_with(
        json!({"flags": {"a": 1}}),
        json!({"flags": {"overrideUrl": FLAGS_URL, "configUrl": "kept"}}),
        ResolverConfig {
            override_field: "overrideUrl".to_string(),
            ..Default::default()
        },
    );
    h.store.set("flags", &value(json!({"a": 3}))).unwrap();

    assert_eq!(
        h.manager.resolve("flags", None),
        value(json!({"a": 3, "configUrl": "kept"}))
    );
}

#[tokio::test]
async fn test_from_config_with_memory_store() {
    let mut config = StrataConfig::default();
    config.store.kind = strata_store::StoreKind::Memory;

    let remote = Arc::new(StaticRemoteSource::new("test-remote").with_entry("flags", value(json!({"b": 2}))));
    let manager = ConfigManager::from_config(
        &config,
        DefaultCatalog::new().with_entry("flags", value(json!({"a": 1}))),
        remote,
    )
    .unwrap();

    assert_eq!(manager.resolve("flags", None), value(json!({"a": 1, "b": 2})));
}
