//! Deep merge of JSON values.
//!
//! Used where one layer only partially restates another: partial record
//! defaults in a variant over the defaults it inherits, and settings tiers.
//! Lists are replaced entirely, not concatenated.

use serde_json::Value;

/// Deep merge two JSON values, with `overlay` taking precedence over `base`.
///
/// - Objects are merged recursively: keys in overlay override keys in base
/// - Arrays, strings, numbers, booleans are replaced entirely
/// - If overlay is null, the base value is preserved (null means "not specified")
///
/// # Example
/// ```
/// use serde_json::json;
/// use hierconf::merge::deep_merge;
///
/// let base = json!({"model": {"size": 100, "layers": 2}, "tags": ["a"]});
/// let overlay = json!({"model": {"layers": 8}, "tags": ["b"]});
/// assert_eq!(
///     deep_merge(base, overlay),
///     json!({"model": {"size": 100, "layers": 8}, "tags": ["b"]})
/// );
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged_value = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Merge multiple values in order, with later values taking precedence.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}
