//! Dotted-path access into nested JSON maps.
//!
//! Pure structural manipulation: nothing here knows about schemas. Paths are
//! sequences of keys; `split_path` turns `"model.layers"` into `["model", "layers"]`.

use crate::error::{ConfigError, LookupKind, Result};
use serde_json::{Map, Value};

/// Split a dotted path into its segments.
pub fn split_path(dotted: &str) -> Vec<&str> {
    dotted.split('.').collect()
}

/// Set `value` at `path` inside `map`, creating empty maps for missing intermediate keys.
///
/// Sibling keys along the way are left untouched. An existing intermediate value
/// that is not a map is an error rather than being overwritten.
///
/// # Example
/// ```
/// use serde_json::{Map, json};
/// use hierconf::nested::set_nested;
///
/// let mut map = Map::new();
/// set_nested(&mut map, &["a", "b", "c"], json!(42)).unwrap();
/// assert_eq!(serde_json::Value::Object(map), json!({"a": {"b": {"c": 42}}}));
/// ```
pub fn set_nested<S: AsRef<str>>(map: &mut Map<String, Value>, path: &[S], value: Value) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        return Err(ConfigError::type_mismatch("", "a non-empty path", "an empty path"));
    };

    let mut current = map;
    for (depth, key) in parents.iter().enumerate() {
        let key = key.as_ref();
        let entry = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match entry {
            Value::Object(inner) => inner,
            other => {
                return Err(ConfigError::type_mismatch(
                    join_path(&path[..=depth]),
                    "a mapping",
                    describe(other),
                ));
            }
        };
    }

    current.insert(last.as_ref().to_string(), value);
    Ok(())
}

/// Get the value at `path` inside `map`.
///
/// Fails with `NotFound` when a segment is absent and `TypeMismatch` when an
/// intermediate value is not a map.
pub fn get_nested<'a, S: AsRef<str>>(map: &'a Map<String, Value>, path: &[S]) -> Result<&'a Value> {
    let Some((last, parents)) = path.split_last() else {
        return Err(ConfigError::type_mismatch("", "a non-empty path", "an empty path"));
    };

    let mut current = map;
    for (depth, key) in parents.iter().enumerate() {
        let value = lookup(current, key.as_ref(), &path[..=depth])?;
        current = match value {
            Value::Object(inner) => inner,
            other => {
                return Err(ConfigError::type_mismatch(
                    join_path(&path[..=depth]),
                    "a mapping",
                    describe(other),
                ));
            }
        };
    }

    lookup(current, last.as_ref(), path)
}

fn lookup<'a, S: AsRef<str>>(map: &'a Map<String, Value>, key: &str, path: &[S]) -> Result<&'a Value> {
    map.get(key)
        .ok_or_else(|| ConfigError::not_found(LookupKind::Key, join_path(path), map.keys().cloned()))
}

/// Join path segments back into dotted form.
pub fn join_path<S: AsRef<str>>(path: &[S]) -> String {
    path.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(".")
}

/// Short human description of a JSON value for error messages.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("bool {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string {:?}", s),
        Value::Array(_) => "a list".to_string(),
        Value::Object(_) => "a mapping".to_string(),
    }
}
