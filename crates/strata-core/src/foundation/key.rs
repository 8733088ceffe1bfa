//! Context scoping and composite cache keys.
//!
//! A configuration key may be scoped by a context dimension (city, theme,
//! tracking mode, app name, ...). The core does not know which dimensions
//! exist; callers name them. A context-scoped layer is a mapping from
//! context value to sub-tree:
//!
//! ```json
//! {
//!   "bangalore": { "surge": true },
//!   "default":   { "surge": false }
//! }
//! ```

use std::fmt;

use super::value::ConfigValue;

/// A context dimension and the value selected along it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Context {
    dimension: String,
    value: String,
}

impl Context {
    /// Creates a context, e.g. `Context::new("city", "bangalore")`.
    pub fn new(dimension: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            dimension: dimension.into(),
            value: value.into(),
        }
    }

    pub fn dimension(&self) -> &str {
        &self.dimension
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Selects this context's sub-tree from a context-keyed layer.
    ///
    /// Falls back to the `fallback` entry when the layer has no entry for
    /// this context value. A layer that is not a mapping, or has neither
    /// entry, contributes nothing.
    pub fn select<'a>(&self, layer: &'a ConfigValue, fallback: &str) -> Option<&'a ConfigValue> {
        let map = layer.as_map()?;
        map.get(&self.value).or_else(|| map.get(fallback))
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.dimension, self.value)
    }
}

/// Identity of a resolved value in the in-memory cache.
///
/// Two resolutions with equal cache keys are served the same cached result
/// until that entry is invalidated. A context-free resolution carries no
/// context and never collides with a scoped one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    key: String,
    context: Option<Context>,
}

impl CacheKey {
    pub fn new(key: impl Into<String>, context: Option<Context>) -> Self {
        Self {
            key: key.into(),
            context,
        }
    }

    /// Cache key for a context-free resolution.
    pub fn global(key: impl Into<String>) -> Self {
        Self::new(key, None)
    }

    /// The configuration key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(ctx) => write!(f, "{}[{}]", self.key, ctx),
            None => f.write_str(&self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_context_value() {
        let layer = ConfigValue::from(json!({
            "bangalore": {"surge": true},
            "default": {"surge": false}
        }));
        let ctx = Context::new("city", "bangalore");
        assert_eq!(
            ctx.select(&layer, "default"),
            Some(&ConfigValue::from(json!({"surge": true})))
        );
    }

    #[test]
    fn test_select_falls_back_to_all_contexts_entry() {
        let layer = ConfigValue::from(json!({"default": {"surge": false}}));
        let ctx = Context::new("city", "mysore");
        assert_eq!(
            ctx.select(&layer, "default"),
            Some(&ConfigValue::from(json!({"surge": false})))
        );
        assert_eq!(ctx.select(&layer, "*"), None);
    }

    #[test]
    fn test_select_on_non_mapping_contributes_nothing() {
        let ctx = Context::new("theme", "dark");
        assert_eq!(ctx.select(&ConfigValue::from(json!([1, 2])), "default"), None);
    }

    #[test]
    fn test_cache_key_identity() {
        let scoped = CacheKey::new("feature_flags", Some(Context::new("city", "bangalore")));
        let same = CacheKey::new("feature_flags", Some(Context::new("city", "bangalore")));
        let global = CacheKey::global("feature_flags");

        assert_eq!(scoped, same);
        assert_ne!(scoped, global);
        assert_eq!(scoped.to_string(), "feature_flags[city=bangalore]");
        assert_eq!(global.to_string(), "feature_flags");
    }
}
