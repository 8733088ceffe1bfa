//! HTTP override transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use strata_core::url::Url;
use strata_core::{FetchError, FetchResult, OverrideTransport};
use tracing::{debug, info};

use crate::config::HttpTransportConfig;

/// Fetches override documents over HTTP(S).
///
/// The overall deadline is enforced by the caller's
/// [`OverrideFetcher`](strata_core::OverrideFetcher); this transport only
/// bounds connection setup.
#[derive(Clone)]
pub struct HttpOverrideTransport {
    client: Client,
    connect_timeout: Duration,
    max_body_bytes: usize,
}

impl HttpOverrideTransport {
    /// Creates a transport with default settings.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_config(&HttpTransportConfig::default())
    }

    /// Creates a transport from explicit settings.
    pub fn with_config(config: &HttpTransportConfig) -> Result<Self, reqwest::Error> {
        let client = ClientBuilder::new()
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        info!(
            connect_timeout_ms = config.connect_timeout_ms,
            max_body_bytes = config.max_body_bytes,
            "HTTP override transport ready"
        );

        Ok(Self {
            client,
            connect_timeout: config.connect_timeout(),
            max_body_bytes: config.max_body_bytes,
        })
    }

    fn classify(&self, url: &Url, error: &reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout: self.connect_timeout,
            }
        } else {
            FetchError::network(url.as_str(), error.to_string())
        }
    }

    fn oversized(&self, url: &Url, len: u64) -> FetchError {
        FetchError::malformed(
            url.as_str(),
            format!("body of at least {len} bytes exceeds limit of {}", self.max_body_bytes),
        )
    }
}

#[async_trait]
impl OverrideTransport for HttpOverrideTransport {
    async fn get(&self, url: &Url) -> FetchResult<Vec<u8>> {
        let mut resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.classify(url, &e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::network(
                url.as_str(),
                format!("HTTP {} error", status.as_u16()),
            ));
        }

        if let Some(len) = resp.content_length()
            && usize::try_from(len).map_or(true, |len| len > self.max_body_bytes)
        {
            return Err(self.oversized(url, len));
        }

        // Chunked bodies carry no length up front; stop reading at the limit.
        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(|e| self.classify(url, &e))? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(self.oversized(url, (body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url = %url, status = status.as_u16(), bytes = body.len(), "HTTP override fetched");
        Ok(body)
    }

    fn name(&self) -> &str {
        "http"
    }
}
