//! Coercion of raw values to declared field types.
//!
//! Raw values come from definition files and from the CLI, where `"123"` may
//! arrive as a string or an integer depending on how it was sniffed. Coercion
//! is lenient between textual and native forms but never between shapes.

use super::instance::{self, FieldValue};
use super::FieldType;
use crate::error::{ConfigError, Result};
use crate::nested::describe;
use serde_json::{Number, Value};

pub(super) fn coerce(value: FieldValue, ty: &FieldType, path: &str) -> Result<FieldValue> {
    match value {
        FieldValue::Record(record) if accepts_record(ty) => Ok(FieldValue::Record(record)),
        FieldValue::Record(record) => Err(ConfigError::type_mismatch(
            path,
            ty,
            format!("record {}", record.type_name()),
        )),
        FieldValue::Value(value) => coerce_value(value, ty, path),
    }
}

fn accepts_record(ty: &FieldType) -> bool {
    match ty {
        FieldType::Config(_) | FieldType::Any => true,
        FieldType::Optional(inner) => accepts_record(inner),
        _ => false,
    }
}

fn coerce_value(value: Value, ty: &FieldType, path: &str) -> Result<FieldValue> {
    match ty {
        FieldType::Any => Ok(FieldValue::Value(value)),
        FieldType::Optional(_) if value.is_null() => Ok(FieldValue::Value(Value::Null)),
        FieldType::Optional(inner) => coerce_value(value, inner, path),
        FieldType::Config(schema) => match value {
            Value::Object(map) => {
                let input = map.into_iter().map(|(k, v)| (k, FieldValue::Value(v))).collect();
                instance::instantiate(schema, input, path).map(FieldValue::Record)
            }
            other => Err(ConfigError::type_mismatch(path, ty, describe(&other))),
        },
        _ => coerce_plain(value, ty, path).map(FieldValue::Value),
    }
}

fn coerce_plain(value: Value, ty: &FieldType, path: &str) -> Result<Value> {
    let coerced = match (ty, &value) {
        (FieldType::Int, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(value.clone()),
        (FieldType::Int, Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| Value::from(f as i64)),
        (FieldType::Int, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),

        (FieldType::Float, Value::Number(n)) => n.as_f64().and_then(Number::from_f64).map(Value::Number),
        (FieldType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),

        (FieldType::Bool, Value::Bool(_)) => Some(value.clone()),
        (FieldType::Bool, Value::String(s)) => parse_bool(s).map(Value::Bool),
        (FieldType::Bool, Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },

        (FieldType::Str, Value::String(_)) => Some(value.clone()),
        (FieldType::Str, Value::Number(n)) => Some(Value::String(n.to_string())),
        (FieldType::Str, Value::Bool(b)) => Some(Value::String(b.to_string())),

        (FieldType::List(inner), Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, index);
                out.push(coerce_value(item.clone(), inner, &item_path)?.to_value());
            }
            Some(Value::Array(out))
        }
        (FieldType::List(_), Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Array(_)) => return coerce_plain(parsed, ty, path),
            _ => None,
        },

        (FieldType::Map, Value::Object(_)) => Some(value.clone()),
        (FieldType::Map, Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Object(_)) => Some(parsed),
            _ => None,
        },

        _ => None,
    };

    coerced.ok_or_else(|| ConfigError::type_mismatch(path, ty, describe(&value)))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
