//! # Strata Transport
//!
//! Network transports that move override documents for the Strata
//! resolver.
//!
//! This crate provides concrete implementations of the
//! [`OverrideTransport`](strata_core::OverrideTransport) contract defined in
//! `strata-core`. Transports only move bytes; URL validation, timeouts and
//! document parsing are owned by
//! [`OverrideFetcher`](strata_core::OverrideFetcher).
//!
//! ## Features
//!
//! - `http-client`: HTTP(S) transport backed by `reqwest`
//! - `full`: All transports
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  ConfigManager      │  (strata-runtime)
//! ├─────────────────────┤
//! │  OverrideFetcher    │  (strata-core: scheme, timeout, parse)
//! ├─────────────────────┤
//! │  strata-transport   │  <- This crate (bytes over the wire)
//! ├─────────────────────┤
//! │  Network (HTTP)     │
//! └─────────────────────┘
//! ```

#[cfg(feature = "http-client")]
pub mod http;

mod config;

pub use config::HttpTransportConfig;

#[cfg(feature = "http-client")]
pub use http::HttpOverrideTransport;
