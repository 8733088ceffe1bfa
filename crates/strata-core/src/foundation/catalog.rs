//! The default catalog: compiled-in baseline values, lowest precedence.
//!
//! A catalog is immutable once handed to a resolver. Cache clears never
//! touch it.
//!
//! ```rust
//! use strata_core::{ConfigValue, DefaultCatalog};
//!
//! let catalog = DefaultCatalog::from_json_str(r#"{
//!     "feature_flags": {"dark_mode": false},
//!     "surge": {"default": {"multiplier": 1.0}, "bangalore": {"multiplier": 1.4}}
//! }"#)?;
//!
//! catalog.require(["feature_flags", "surge"])?;
//! assert!(catalog.get("feature_flags").is_some_and(ConfigValue::is_map));
//! # Ok::<(), strata_core::CatalogError>(())
//! ```

use std::collections::BTreeMap;

use super::value::ConfigValue;
use crate::error::{CatalogError, CatalogResult};

/// Immutable table of default values per configuration key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultCatalog {
    entries: BTreeMap<String, ConfigValue>,
}

impl DefaultCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, replacing any previous default for `key`.
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Builds a catalog from a mapping of key to default value.
    pub fn from_value(value: ConfigValue) -> CatalogResult<Self> {
        match value {
            ConfigValue::Map(entries) => Ok(Self { entries }),
            other => Err(CatalogError::NotAMapping(other.kind().as_str())),
        }
    }

    /// Builds a catalog from a JSON document, typically embedded with `include_str!`.
    pub fn from_json_str(text: &str) -> CatalogResult<Self> {
        Self::from_value(ConfigValue::from_json_str(text)?)
    }

    /// Fails with [`CatalogError::MissingDefault`] for the first key without a default.
    ///
    /// Intended to run once at startup; a missing default is an authoring
    /// defect, not a runtime condition.
    pub fn require<I, K>(&self, keys: I) -> CatalogResult<()>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        for key in keys {
            let key = key.as_ref();
            if !self.entries.contains_key(key) {
                return Err(CatalogError::MissingDefault(key.to_string()));
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys with a default, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_str() {
        let catalog = DefaultCatalog::from_json_str(r#"{"a": {"x": 1}, "b": true}"#).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("b"), Some(&ConfigValue::Bool(true)));
        assert_eq!(catalog.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_rejects_non_mapping() {
        let result = DefaultCatalog::from_json_str("[1, 2]");
        assert!(matches!(result, Err(CatalogError::NotAMapping("list"))));
        assert!(matches!(
            DefaultCatalog::from_json_str("{"),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn test_require_reports_missing_default() {
        let catalog = DefaultCatalog::new().with_entry("feature_flags", ConfigValue::from(json!({})));
        assert!(catalog.require(["feature_flags"]).is_ok());

        let err = catalog.require(["feature_flags", "themes"]).unwrap_err();
        assert!(matches!(err, CatalogError::MissingDefault(ref key) if key == "themes"));
    }
}
