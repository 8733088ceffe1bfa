//! Transport configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the HTTP override transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpTransportConfig {
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// `User-Agent` header sent with every request.
    pub user_agent: String,

    /// Bodies larger than this are rejected as malformed.
    pub max_body_bytes: usize,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            user_agent: concat!("strata/", env!("CARGO_PKG_VERSION")).to_string(),
            max_body_bytes: 4 * 1024 * 1024, // 4 MB
        }
    }
}

impl HttpTransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
