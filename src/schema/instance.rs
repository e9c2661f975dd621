//! Validated instances of schema types.

use super::{ExtraPolicy, SchemaType, coerce};
use crate::error::{ConfigError, Result};
use crate::nested::split_path;
use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Key used to tag records with their type name in exported output.
pub const TYPENAME_KEY: &str = "__typename__";

/// Value held by one field of a [`ConfigInstance`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Scalar, list or free-form map.
    Value(Value),
    /// Nested typed record.
    Record(ConfigInstance),
}

impl FieldValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FieldValue::Value(value) => Some(value),
            FieldValue::Record(_) => None,
        }
    }

    pub fn as_record(&self) -> Option<&ConfigInstance> {
        match self {
            FieldValue::Record(record) => Some(record),
            FieldValue::Value(_) => None,
        }
    }

    /// Plain JSON form, records flattened to maps.
    pub fn to_value(&self) -> Value {
        match self {
            FieldValue::Value(value) => value.clone(),
            FieldValue::Record(record) => record.to_value(),
        }
    }

    fn to_annotated_value(&self) -> Value {
        match self {
            FieldValue::Value(value) => value.clone(),
            FieldValue::Record(record) => record.to_annotated_value(),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

impl From<ConfigInstance> for FieldValue {
    fn from(record: ConfigInstance) -> Self {
        FieldValue::Record(record)
    }
}

/// A validated value of a [`SchemaType`].
///
/// Fields appear in declaration order, followed by any extra keys the schema
/// allows.
#[derive(Debug, Clone)]
pub struct ConfigInstance {
    schema: Arc<SchemaType>,
    fields: Vec<(String, FieldValue)>,
}

impl ConfigInstance {
    /// The concrete type of this instance.
    pub fn schema(&self) -> &Arc<SchemaType> {
        &self.schema
    }

    pub fn type_name(&self) -> &str {
        self.schema.name()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Scalar value of a field.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(FieldValue::as_value)
    }

    /// Nested record held by a field.
    pub fn record(&self, name: &str) -> Option<&ConfigInstance> {
        self.get(name).and_then(FieldValue::as_record)
    }

    /// Look up a dotted path such as `model.layers`.
    ///
    /// Descends through nested records and through plain maps.
    pub fn lookup(&self, dotted: &str) -> Option<FieldValue> {
        let segments = split_path(dotted);
        let (first, rest) = segments.split_first()?;
        let mut current = self.get(first)?.clone();
        for segment in rest {
            current = match current {
                FieldValue::Record(record) => record.get(segment)?.clone(),
                FieldValue::Value(Value::Object(map)) => FieldValue::Value(map.get(*segment)?.clone()),
                FieldValue::Value(_) => return None,
            };
        }
        Some(current)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Plain nested mapping without type tags.
    pub fn to_map(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_value()))
            .collect()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.to_map())
    }

    /// Nested mapping where every record carries a `__typename__` key.
    pub fn to_annotated_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(TYPENAME_KEY.to_string(), Value::String(self.type_name().to_string()));
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.to_annotated_value());
        }
        Value::Object(map)
    }

    /// Deserialize into an application struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_value())?)
    }
}

impl PartialEq for ConfigInstance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema) && self.fields == other.fields
    }
}

impl Serialize for ConfigInstance {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            match v {
                FieldValue::Value(value) => map.serialize_entry(k, value)?,
                FieldValue::Record(record) => map.serialize_entry(k, record)?,
            }
        }
        map.end()
    }
}

/// Build an instance of `schema` from `input`, coercing each declared field.
///
/// `prefix` is the dotted location of this record, used in error messages.
pub(super) fn instantiate(
    schema: &Arc<SchemaType>,
    input: Vec<(String, FieldValue)>,
    prefix: &str,
) -> Result<ConfigInstance> {
    let mut remaining: Vec<(String, FieldValue)> = Vec::with_capacity(input.len());
    for (key, value) in input {
        match remaining.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => remaining.push((key, value)),
        }
    }

    let mut fields = Vec::with_capacity(schema.fields().len() + remaining.len());
    for field in schema.fields() {
        let raw = match remaining.iter().position(|(k, _)| *k == field.name) {
            Some(index) => remaining.remove(index).1,
            None => FieldValue::Value(field.default.clone()),
        };
        let path = child_path(prefix, &field.name);
        let value = match (&field.default_type, raw) {
            (Some(slot), FieldValue::Value(Value::Object(map))) => {
                let input = map.into_iter().map(|(k, v)| (k, FieldValue::Value(v))).collect();
                FieldValue::Record(instantiate(slot, input, &path)?)
            }
            (_, raw) => coerce::coerce(raw, &field.ty, &path)?,
        };
        fields.push((field.name.clone(), value));
    }

    match schema.extra() {
        ExtraPolicy::Ignore => {
            for (key, _) in &remaining {
                debug!(schema = schema.name(), key = %child_path(prefix, key), "Ignoring unknown field");
            }
        }
        ExtraPolicy::Allow => fields.extend(remaining),
        ExtraPolicy::Forbid => {
            if !remaining.is_empty() {
                let keys: Vec<String> = remaining.iter().map(|(k, _)| child_path(prefix, k)).collect();
                return Err(ConfigError::validation(
                    schema.name(),
                    format!("unknown field(s): {}", keys.join(", ")),
                ));
            }
        }
    }

    Ok(ConfigInstance {
        schema: Arc::clone(schema),
        fields,
    })
}

pub(super) fn child_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}
