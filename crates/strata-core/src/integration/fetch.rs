//! Override document fetching.
//!
//! The transport only moves bytes. Everything that decides whether those
//! bytes become an override lives here:
//!
//! 1. the URL must parse and use `http` or `https`, checked before any I/O;
//! 2. the transport call is bounded by a timeout and abandoned past it;
//! 3. the body must parse as JSON *and* be a mapping.
//!
//! A failure at any step yields a [`FetchError`] and no document, so a bad
//! deploy of an override can never displace a previously good one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::foundation::value::ConfigValue;

/// Moves the bytes of an override document from its URL.
///
/// Implementations classify their own failures as
/// [`FetchError::Network`] or [`FetchError::Timeout`]; parsing is not their
/// concern.
#[async_trait]
pub trait OverrideTransport: Send + Sync + 'static {
    /// Retrieves the body at `url`.
    async fn get(&self, url: &Url) -> FetchResult<Vec<u8>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "transport"
    }
}

/// Validates an override URL. Only `http` and `https` are accepted.
pub fn parse_override_url(raw: &str) -> FetchResult<Url> {
    let url = Url::parse(raw).map_err(|e| FetchError::invalid_scheme(raw, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::invalid_scheme(
            raw,
            format!("scheme '{other}' is not http or https"),
        )),
    }
}

/// Parses a fetched body into an override document.
pub fn parse_override_document(url: &str, bytes: &[u8]) -> FetchResult<ConfigValue> {
    let document =
        ConfigValue::from_json_slice(bytes).map_err(|e| FetchError::malformed(url, e.to_string()))?;
    if !document.is_map() {
        return Err(FetchError::malformed(
            url,
            format!("expected a mapping, found {}", document.kind()),
        ));
    }
    Ok(document)
}

/// Fetches and validates override documents through an [`OverrideTransport`].
#[derive(Clone)]
pub struct OverrideFetcher {
    transport: Arc<dyn OverrideTransport>,
    timeout: Duration,
}

impl OverrideFetcher {
    /// Creates a fetcher whose calls are abandoned after `timeout`.
    pub fn new(transport: Arc<dyn OverrideTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// Validates `url`, fetches it and parses the body.
    pub async fn fetch(&self, url: &str) -> FetchResult<ConfigValue> {
        let parsed = parse_override_url(url)?;
        self.fetch_url(&parsed).await
    }

    /// Fetches an already validated URL and parses the body.
    pub async fn fetch_url(&self, url: &Url) -> FetchResult<ConfigValue> {
        trace!(url = %url, transport = %self.transport.name(), "Fetching override document");

        let bytes = tokio::time::timeout(self.timeout, self.transport.get(url))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            })??;

        let document = parse_override_document(url.as_str(), &bytes)?;
        debug!(url = %url, bytes = bytes.len(), "Fetched override document");
        Ok(document)
    }
}

// =============================================================================
// In-memory transport
// =============================================================================

#[derive(Clone)]
struct Route {
    response: FetchResult<Vec<u8>>,
    delay: Duration,
}

/// Transport serving canned responses per URL.
///
/// Unrouted URLs fail with a network error. Every call is counted, which
/// lets callers assert how many fetches actually happened.
#[derive(Default)]
pub struct MemoryTransport {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` for `url`.
    pub fn respond(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.route(url, Ok(body.into()));
    }

    /// Serves the JSON serialization of `document` for `url`.
    pub fn respond_json(&self, url: impl Into<String>, document: &ConfigValue) {
        self.route(url, Ok(document.to_string().into_bytes()));
    }

    /// Fails every request for `url` with `error`.
    pub fn fail(&self, url: impl Into<String>, error: FetchError) {
        self.route(url, Err(error));
    }

    /// Delays the response for `url` by `delay`.
    pub fn delay(&self, url: &str, delay: Duration) {
        if let Some(route) = self.routes.lock().get_mut(url) {
            route.delay = delay;
        }
    }

    /// Total number of requests served.
    pub fn calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Number of requests served for `url`.
    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().get(url).copied().unwrap_or(0)
    }

    fn route(&self, url: impl Into<String>, response: FetchResult<Vec<u8>>) {
        let mut routes = self.routes.lock();
        let url = url.into();
        let delay = routes.get(&url).map(|r| r.delay).unwrap_or_default();
        routes.insert(url, Route { response, delay });
    }
}

#[async_trait]
impl OverrideTransport for MemoryTransport {
    async fn get(&self, url: &Url) -> FetchResult<Vec<u8>> {
        let key = url.as_str().to_string();
        *self.calls.lock().entry(key.clone()).or_default() += 1;

        let route = self.routes.lock().get(&key).cloned();
        let Some(route) = route else {
            return Err(FetchError::network(key, "no route"));
        };
        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }
        route.response
    }

    fn name(&self) -> &str {
        "memory"
    }
}
