//! Deep merge of configuration layers.
//!
//! Layers are applied from lowest to highest precedence. At every path:
//!
//! | lower \ higher | absent | mapping | anything else |
//! |----------------|--------|---------|---------------|
//! | absent         | absent | higher  | higher        |
//! | mapping        | lower  | union, recursive | higher |
//! | anything else  | lower  | higher  | higher        |
//!
//! Lists are never merged element-wise; the highest list present replaces
//! everything below it. An explicit `null` is a present value and wins like
//! any other scalar.
//!
//! Folding layers this way is associative and `overlay(x, x) == x`, so
//! re-applying the same upper layers to an already merged result is a no-op.

use super::value::ConfigValue;

/// Merges the default, remote and override layers of a key.
///
/// Returns `None` only when all three layers are absent.
pub fn merge(
    low: Option<&ConfigValue>,
    mid: Option<&ConfigValue>,
    high: Option<&ConfigValue>,
) -> Option<ConfigValue> {
    merge_layers([low, mid, high])
}

/// Merges any number of layers, ordered from lowest to highest precedence.
pub fn merge_layers<'a, I>(layers: I) -> Option<ConfigValue>
where
    I: IntoIterator<Item = Option<&'a ConfigValue>>,
{
    let mut merged: Option<ConfigValue> = None;
    for layer in layers.into_iter().flatten() {
        match merged.as_mut() {
            Some(base) => overlay_into(base, layer),
            None => merged = Some(layer.clone()),
        }
    }
    merged
}

/// Lays `top` over `base`.
pub fn overlay(base: Option<&ConfigValue>, top: Option<&ConfigValue>) -> Option<ConfigValue> {
    merge_layers([base, top])
}

fn overlay_into(base: &mut ConfigValue, top: &ConfigValue) {
    match (base, top) {
        (ConfigValue::Map(lower), ConfigValue::Map(upper)) => {
            for (key, value) in upper {
                match lower.get_mut(key) {
                    Some(slot) => overlay_into(slot, value),
                    None => {
                        lower.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}
