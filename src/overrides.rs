//! Command-line override tokens.
//!
//! Recognised forms:
//!
//! | Token                   | Meaning                                   |
//! |-------------------------|-------------------------------------------|
//! | `--config=quick-test`   | select a variant                          |
//! | `model=SmallModelConfig`| swap a config group                       |
//! | `model.layers=5`        | field override on a root field            |
//! | `--model.num-layers=5`  | field override, hyphens become underscores|
//! | `--debug`               | field override to `true`                  |
//!
//! Values are sniffed: `true`/`false`, integers, floats, `null` and JSON
//! arrays or objects become typed values; everything else stays a string.
//! A scalar is only sniffed when the typed value prints back as the same
//! token, so `007` and `1.10` stay strings. The schema coerces strings later
//! where the declared type requires it.

use crate::naming::kebab_to_snake;
use crate::registry::Registry;
use crate::schema::SchemaType;
use serde_json::{Number, Value};
use std::sync::Arc;
use tracing::debug;

const VARIANT_FLAG: &str = "config";

/// Classified override tokens, in command-line order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOverrides {
    /// Selected variant; the last `--config` wins.
    pub variant: Option<String>,
    /// `(group, member)` selections.
    pub groups: Vec<(String, String)>,
    /// `(dotted path, value)` field overrides.
    pub fields: Vec<(String, Value)>,
    /// Tokens matching no recognised form.
    pub unrecognized: Vec<String>,
}

/// Classifies override tokens against a root type and a registry.
#[derive(Debug)]
pub struct OverrideParser<'a> {
    root: &'a Arc<SchemaType>,
    registry: &'a Registry,
}

impl<'a> OverrideParser<'a> {
    pub fn new(root: &'a Arc<SchemaType>, registry: &'a Registry) -> Self {
        Self { root, registry }
    }

    /// Classify every token. Never fails; unknown forms land in `unrecognized`.
    pub fn parse<I, S>(&self, tokens: I) -> ParsedOverrides
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = ParsedOverrides::default();
        for token in tokens {
            let token = token.as_ref();
            self.classify(token, &mut parsed);
        }
        debug!(
            variant = ?parsed.variant,
            groups = parsed.groups.len(),
            fields = parsed.fields.len(),
            unrecognized = parsed.unrecognized.len(),
            "Parsed override tokens"
        );
        parsed
    }

    fn classify(&self, token: &str, parsed: &mut ParsedOverrides) {
        if let Some(flag) = token.strip_prefix("--") {
            match flag.split_once('=') {
                Some((VARIANT_FLAG, name)) if !name.is_empty() => {
                    parsed.variant = Some(name.to_string());
                }
                Some((path, raw)) if is_path(path) && path != VARIANT_FLAG => {
                    parsed.fields.push((normalize_path(path), parse_value(raw)));
                }
                None if is_path(flag) && flag != VARIANT_FLAG => {
                    parsed.fields.push((normalize_path(flag), Value::Bool(true)));
                }
                _ => parsed.unrecognized.push(token.to_string()),
            }
            return;
        }

        let Some((key, raw)) = token.split_once('=') else {
            parsed.unrecognized.push(token.to_string());
            return;
        };

        if self.registry.has_group(key) {
            parsed.groups.push((key.to_string(), raw.to_string()));
        } else if is_path(key) && self.is_root_path(key) {
            parsed.fields.push((normalize_path(key), parse_value(raw)));
        } else {
            parsed.unrecognized.push(token.to_string());
        }
    }

    fn is_root_path(&self, path: &str) -> bool {
        let first = path.split('.').next().unwrap_or_default();
        self.root.field(&kebab_to_snake(first)).is_some()
    }
}

/// Turn `model.num-layers` into `model.num_layers`.
pub fn normalize_path(path: &str) -> String {
    kebab_to_snake(path)
}

fn is_path(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        })
}

/// Sniff a raw token value into a typed JSON value.
pub fn parse_value(raw: &str) -> Value {
    if raw.starts_with('[') || raw.starts_with('{') {
        return serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    }

    let scalar = match raw {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" => Some(Value::Null),
        _ => raw
            .parse::<i64>()
            .ok()
            .map(Value::from)
            .or_else(|| raw.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)),
    };
    match scalar {
        Some(value) if value.to_string() == raw => value,
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use serde_json::json;

    fn fixture() -> (Arc<SchemaType>, Registry) {
        let model = SchemaType::builder("ModelConfig")
            .field("num_layers", FieldType::Int, 6)
            .build()
            .unwrap();
        let root = SchemaType::builder("TrainConfig")
            .field("epochs", FieldType::Int, 100)
            .field("debug", FieldType::Bool, false)
            .config_field("model", &model)
            .build()
            .unwrap();
        let mut registry = Registry::new();
        registry.register_group("model", "ViTConfig", model);
        (root, registry)
    }

    #[test]
    fn test_parse_all_forms() {
        let (root, registry) = fixture();
        let parsed = OverrideParser::new(&root, &registry).parse([
            "--config=quick-test",
            "model=ViTConfig",
            "--model.num-layers=24",
            "epochs=5",
            "--debug",
        ]);

        assert_eq!(parsed.variant.as_deref(), Some("quick-test"));
        assert_eq!(parsed.groups, vec![("model".to_string(), "ViTConfig".to_string())]);
        assert_eq!(
            parsed.fields,
            vec![
                ("model.num_layers".to_string(), json!(24)),
                ("epochs".to_string(), json!(5)),
                ("debug".to_string(), json!(true)),
            ]
        );
        assert!(parsed.unrecognized.is_empty());
    }

    #[test]
    fn test_last_variant_wins() {
        let (root, registry) = fixture();
        let parsed = OverrideParser::new(&root, &registry).parse(["--config=a", "--config=b"]);
        assert_eq!(parsed.variant.as_deref(), Some("b"));
    }

    #[test]
    fn test_unrecognized_tokens() {
        let (root, registry) = fixture();
        let parsed = OverrideParser::new(&root, &registry).parse([
            "positional",
            "unknown=1",
            "--config",
            "--config=",
            "--=5",
            "--a..b=1",
        ]);
        assert!(parsed.fields.is_empty());
        assert_eq!(parsed.unrecognized.len(), 6);
    }

    #[test]
    fn test_group_takes_precedence_over_field() {
        let (root, registry) = fixture();
        let parsed = OverrideParser::new(&root, &registry).parse(["model=ViTConfig"]);
        assert_eq!(parsed.groups.len(), 1);
        assert!(parsed.fields.is_empty());
    }

    #[test]
    fn test_value_sniffing() {
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("False"), json!("False"));
        assert_eq!(parse_value("null"), Value::Null);
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("-7"), json!(-7));
        assert_eq!(parse_value("0.5"), json!(0.5));
        assert_eq!(parse_value("2.0"), json!(2.0));
        assert_eq!(parse_value("[1, 2]"), json!([1, 2]));
        assert_eq!(parse_value(r#"{"a": 1}"#), json!({"a": 1}));
        assert_eq!(parse_value("[oops"), json!("[oops"));
        assert_eq!(parse_value("inf"), json!("inf"));
        assert_eq!(parse_value("resnet"), json!("resnet"));
        assert_eq!(parse_value(""), json!(""));
    }

    #[test]
    fn test_value_sniffing_keeps_text_that_would_not_round_trip() {
        assert_eq!(parse_value("007"), json!("007"));
        assert_eq!(parse_value("1.10"), json!("1.10"));
        assert_eq!(parse_value("1e-3"), json!("1e-3"));
        assert_eq!(parse_value("+5"), json!("+5"));
        assert_eq!(parse_value("NaN"), json!("NaN"));
    }
}
