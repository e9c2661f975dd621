//! Builds one configuration instance from defaults, group swaps and field overrides.
//!
//! Override priority (lowest to highest):
//! 1. Root type defaults (the root may itself be a variant)
//! 2. Group selections, which replace a whole subtree with another type
//! 3. Field overrides on dotted paths
//!
//! The merge runs on an untyped working map and only converts back to typed
//! records at the end, field by field.

use crate::error::Result;
use crate::nested::{set_nested, split_path};
use crate::registry::Registry;
use crate::schema::{ConfigInstance, FieldValue, SchemaType};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Export key holding the applied override lines.
pub const OVERRIDES_KEY: &str = "overrides";

/// Fallback export key when the root type has its own `overrides` field.
pub const RESERVED_OVERRIDES_KEY: &str = "__overrides__";

/// Which mechanism produced an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideSource {
    /// A group selection (`model=SmallModelConfig`).
    Group,
    /// A field override (`--model.layers=5`).
    Field,
}

impl fmt::Display for OverrideSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideSource::Group => write!(f, "group"),
            OverrideSource::Field => write!(f, "field"),
        }
    }
}

/// One override the builder actually applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedOverride {
    /// Group name or dotted field path.
    pub path: String,
    /// Selected type name for groups, raw value for fields.
    pub value: Value,
    pub source: OverrideSource,
}

impl fmt::Display for AppliedOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::String(s) => write!(f, "{} = {} (source: {})", self.path, s, self.source),
            other => write!(f, "{} = {} (source: {})", self.path, other, self.source),
        }
    }
}

/// The final configuration plus the overrides that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    config: ConfigInstance,
    overrides: Vec<AppliedOverride>,
}

impl ResolvedConfig {
    pub fn config(&self) -> &ConfigInstance {
        &self.config
    }

    /// Applied overrides, group swaps first, each in application order.
    pub fn overrides(&self) -> &[AppliedOverride] {
        &self.overrides
    }

    /// Human-readable override lines: `"<path> = <value> (source: group|field)"`.
    pub fn overrides_summary(&self) -> Vec<String> {
        self.overrides.iter().map(ToString::to_string).collect()
    }

    /// Name of the root type (the variant, when one was selected).
    pub fn type_name(&self) -> &str {
        self.config.type_name()
    }

    /// Value at a dotted path.
    pub fn get(&self, dotted: &str) -> Option<FieldValue> {
        self.config.lookup(dotted)
    }

    /// Deserialize the configuration into an application struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        self.config.deserialize()
    }

    /// Export form: records tagged with `__typename__` plus an `overrides` array.
    ///
    /// A root field named `overrides` keeps its value; the array then goes
    /// under `__overrides__`.
    pub fn to_value(&self) -> Value {
        let mut value = self.config.to_annotated_value();
        if let Value::Object(map) = &mut value {
            let key = if map.contains_key(OVERRIDES_KEY) {
                RESERVED_OVERRIDES_KEY
            } else {
                OVERRIDES_KEY
            };
            map.insert(
                key.to_string(),
                Value::Array(self.overrides_summary().into_iter().map(Value::String).collect()),
            );
        }
        value
    }

    /// Write the export form as pretty JSON.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.to_value())?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Exported resolved configuration");
        Ok(())
    }

    /// Log the root type and every applied override.
    pub fn log_summary(&self) {
        info!(config = self.type_name(), overrides = self.overrides.len(), "Resolved configuration");
        for line in self.overrides_summary() {
            info!("  {}", line);
        }
    }
}

/// Build a configuration instance with all overrides applied.
///
/// `groups` holds `(group, type name)` selections; `fields` holds
/// `(dotted path, raw value)` overrides applied in order, later entries
/// winning. Raw values are coerced to the declared field types.
///
/// Group names and override paths that match no root field are kept in the
/// working map; whether they survive is decided by the root type's extra-field
/// policy.
pub fn build(
    root: &Arc<SchemaType>,
    registry: &Registry,
    groups: &[(String, String)],
    fields: &[(String, Value)],
) -> Result<ResolvedConfig> {
    let defaults = root.default_instance()?;
    let mut working = defaults.to_map();
    let mut overrides = Vec::with_capacity(groups.len() + fields.len());

    // Group selections replace whole subtrees.
    let mut swapped: BTreeMap<String, Arc<SchemaType>> = BTreeMap::new();
    for (group, name) in groups {
        let schema = registry.get_group(group, name)?;
        let instance = schema.default_instance()?;
        working.insert(group.clone(), instance.to_value());
        swapped.insert(group.clone(), Arc::clone(schema));
        debug!(group = %group, config = %name, "Applied group selection");
        overrides.push(AppliedOverride {
            path: group.clone(),
            value: Value::String(schema.name().to_string()),
            source: OverrideSource::Group,
        });
    }

    for (path, value) in fields {
        set_nested(&mut working, &split_path(path), value.clone())?;
        debug!(path = %path, value = %value, "Applied field override");
        overrides.push(AppliedOverride {
            path: path.clone(),
            value: value.clone(),
            source: OverrideSource::Field,
        });
    }

    let mut input: Vec<(String, FieldValue)> = Vec::with_capacity(working.len());
    for (key, value) in working {
        let field_value = match swapped.get(&key) {
            // Swapped groups keep their selected type, with nested overrides applied.
            Some(schema) => match value {
                Value::Object(map) => FieldValue::Record(schema.instantiate_at(&map, &key)?),
                other => FieldValue::Value(other),
            },
            None => FieldValue::Value(value),
        };
        input.push((key, field_value));
    }

    // Untouched or partially overridden nested records are rebuilt against
    // their declared types by the root's own validation.
    let config = root.instantiate_fields(input)?;
    info!(config = config.type_name(), overrides = overrides.len(), "Built configuration");

    Ok(ResolvedConfig { config, overrides })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::schema::{ExtraPolicy, FieldType};
    use serde_json::json;

    struct Fixture {
        train: Arc<SchemaType>,
        quick: Arc<SchemaType>,
        registry: Registry,
    }

    fn fixture() -> Fixture {
        let model = SchemaType::builder("ModelConfig")
            .field("size", FieldType::Int, 100)
            .build()
            .unwrap();
        let optimizer = SchemaType::builder("OptimizerConfig")
            .field("lr", FieldType::Float, 0.001)
            .build()
            .unwrap();
        let train = SchemaType::builder("TrainConfig")
            .field("epochs", FieldType::Int, 100)
            .config_field("model", &model)
            .config_field("optimizer", &optimizer)
            .build()
            .unwrap();
        let quick = SchemaType::builder("QuickTest")
            .extends(&train)
            .default_value("epochs", 5)
            .build()
            .unwrap();
        let small = SchemaType::builder("SmallModelConfig")
            .field("size", FieldType::Int, 100)
            .field("layers", FieldType::Int, 2)
            .build()
            .unwrap();
        let large = SchemaType::builder("LargeModelConfig")
            .field("width", FieldType::Int, 4096)
            .field("heads", FieldType::Int, 32)
            .build()
            .unwrap();

        let mut registry = Registry::new();
        registry.register_group("model", "SmallModelConfig", small);
        registry.register_group("model", "LargeModelConfig", large);
        registry.register_variant("QuickTest", Arc::clone(&quick));

        Fixture { train, quick, registry }
    }

    fn groups(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(g, n)| (g.to_string(), n.to_string())).collect()
    }

    fn fields(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
        pairs.iter().map(|(p, v)| (p.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_no_overrides_equals_defaults() {
        let f = fixture();
        let resolved = build(&f.train, &f.registry, &[], &[]).unwrap();
        assert_eq!(resolved.config(), &f.train.default_instance().unwrap());
        assert!(resolved.overrides().is_empty());
    }

    #[test]
    fn test_priority_law() {
        let f = fixture();
        let resolved = build(
            &f.quick,
            &f.registry,
            &groups(&[("model", "SmallModelConfig")]),
            &fields(&[("epochs", json!(15)), ("model.layers", json!(5))]),
        )
        .unwrap();

        assert_eq!(resolved.type_name(), "QuickTest");
        assert_eq!(resolved.config().value("epochs"), Some(&json!(15)));
        let model = resolved.config().record("model").unwrap();
        assert_eq!(model.type_name(), "SmallModelConfig");
        assert_eq!(model.value("size"), Some(&json!(100)));
        assert_eq!(model.value("layers"), Some(&json!(5)));
    }

    #[test]
    fn test_group_swap_replaces_whole_subtree() {
        let f = fixture();
        let resolved = build(&f.train, &f.registry, &groups(&[("model", "LargeModelConfig")]), &[]).unwrap();
        let model = resolved.config().record("model").unwrap();
        assert_eq!(model.type_name(), "LargeModelConfig");
        assert!(model.get("size").is_none());
        assert_eq!(model.to_value(), json!({"width": 4096, "heads": 32}));
    }

    #[test]
    fn test_nested_override_without_swap_keeps_declared_type() {
        let f = fixture();
        let resolved = build(&f.train, &f.registry, &[], &fields(&[("model.size", json!("500"))])).unwrap();
        let model = resolved.config().record("model").unwrap();
        assert_eq!(model.type_name(), "ModelConfig");
        assert_eq!(model.value("size"), Some(&json!(500)));
    }

    #[test]
    fn test_last_field_override_wins() {
        let f = fixture();
        let resolved = build(
            &f.train,
            &f.registry,
            &[],
            &fields(&[("epochs", json!(1)), ("epochs", json!(2))]),
        )
        .unwrap();
        assert_eq!(resolved.config().value("epochs"), Some(&json!(2)));
        assert_eq!(resolved.overrides().len(), 2);
    }

    #[test]
    fn test_unknown_group_fails() {
        let f = fixture();
        let err = build(&f.train, &f.registry, &groups(&[("model", "Nope")]), &[]).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("LargeModelConfig, SmallModelConfig"));
    }

    #[test]
    fn test_coercion_failure_is_type_mismatch() {
        let f = fixture();
        let err = build(&f.train, &f.registry, &[], &fields(&[("epochs", json!("many"))])).unwrap_err();
        assert!(matches!(err, ConfigError::TypeMismatch { ref path, .. } if path == "epochs"));
    }

    #[test]
    fn test_override_through_scalar_fails() {
        let f = fixture();
        let err = build(&f.train, &f.registry, &[], &fields(&[("epochs.inner", json!(1))])).unwrap_err();
        assert!(matches!(err, ConfigError::TypeMismatch { .. }));
    }

    #[test]
    fn test_unknown_paths_follow_extra_policy() {
        let f = fixture();
        // Default policy drops the unknown key.
        let resolved = build(&f.train, &f.registry, &[], &fields(&[("nonexistent", json!(1))])).unwrap();
        assert!(resolved.config().get("nonexistent").is_none());

        let strict = SchemaType::builder("Strict")
            .extends(&f.train)
            .extra(ExtraPolicy::Forbid)
            .build()
            .unwrap();
        let err = build(&strict, &f.registry, &[], &fields(&[("nonexistent", json!(1))])).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_group_without_field_kept_when_allowed() {
        let f = fixture();
        let open = SchemaType::builder("Open")
            .field("epochs", FieldType::Int, 1)
            .extra(ExtraPolicy::Allow)
            .build()
            .unwrap();
        let resolved = build(&open, &f.registry, &groups(&[("model", "SmallModelConfig")]), &[]).unwrap();
        assert_eq!(resolved.config().record("model").unwrap().type_name(), "SmallModelConfig");
    }

    #[test]
    fn test_idempotent_and_inputs_untouched() {
        let f = fixture();
        let g = groups(&[("model", "SmallModelConfig")]);
        let o = fields(&[("model.layers", json!(7))]);
        let first = build(&f.quick, &f.registry, &g, &o).unwrap();
        let second = build(&f.quick, &f.registry, &g, &o).unwrap();
        assert_eq!(first, second);
        assert_eq!(o, fields(&[("model.layers", json!(7))]));
        assert_eq!(f.registry.list_groups()["model"].len(), 2);
    }

    #[test]
    fn test_summary_and_export_value() {
        let f = fixture();
        let resolved = build(
            &f.train,
            &f.registry,
            &groups(&[("model", "SmallModelConfig")]),
            &fields(&[("epochs", json!(50))]),
        )
        .unwrap();

        assert_eq!(
            resolved.overrides_summary(),
            vec![
                "model = SmallModelConfig (source: group)".to_string(),
                "epochs = 50 (source: field)".to_string(),
            ]
        );

        let value = resolved.to_value();
        assert_eq!(value["__typename__"], json!("TrainConfig"));
        assert_eq!(value["model"]["__typename__"], json!("SmallModelConfig"));
        assert_eq!(value["overrides"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_export_keeps_root_overrides_field() {
        let root = SchemaType::builder("Patch")
            .field("overrides", FieldType::Map, json!({"retries": 3}))
            .field("level", FieldType::Int, 1)
            .build()
            .unwrap();
        let resolved = build(&root, &Registry::new(), &[], &fields(&[("level", json!(2))])).unwrap();

        let value = resolved.to_value();
        assert_eq!(value["overrides"], json!({"retries": 3}));
        assert_eq!(value["__overrides__"], json!(["level = 2 (source: field)"]));
    }
}
