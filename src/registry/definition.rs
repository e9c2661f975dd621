//! On-disk definition format.
//!
//! A definition file is a YAML mapping from type name to definition:
//!
//! ```yaml
//! TrainConfig:
//!   description: Main training configuration
//!   fields:
//!     epochs: { type: int, default: 100, description: Number of epochs }
//!     model: { type: ModelConfig }
//!
//! QuickTest:
//!   extends: TrainConfig
//!   fields:
//!     epochs: 5
//! ```
//!
//! A field is either a full declaration (a mapping using only the keys
//! `type`, `default` and `description`) or a bare default value whose type is
//! inherited or inferred.
//!
//! A record slot may name another type as its default, which is then built in
//! place of the declared type:
//!
//! ```yaml
//! TrainConfig:
//!   fields:
//!     model: { type: ModelConfig, default: MediumModel }
//! ```

use crate::error::{ConfigError, Result};
use crate::schema::{ExtraPolicy, FieldType, SchemaType};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

const SPEC_KEYS: [&str; 3] = ["type", "default", "description"];

/// One type definition as written in a file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDefinition {
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub extra: Option<ExtraPolicy>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// A parsed field entry.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSpec {
    Full {
        ty: Option<TypeExpr>,
        default: Option<Value>,
        description: Option<String>,
    },
    Bare(Value),
}

impl FieldSpec {
    pub fn parse(value: &Value) -> std::result::Result<FieldSpec, String> {
        let Value::Object(map) = value else {
            return Ok(FieldSpec::Bare(value.clone()));
        };
        if map.is_empty() || !map.keys().all(|k| SPEC_KEYS.contains(&k.as_str())) {
            return Ok(FieldSpec::Bare(value.clone()));
        }

        let ty = match map.get("type") {
            Some(Value::String(s)) => Some(TypeExpr::parse(s)?),
            Some(other) => return Err(format!("'type' must be a string, got {}", other)),
            None => None,
        };
        let description = match map.get("description") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => return Err(format!("'description' must be a string, got {}", other)),
            None => None,
        };

        Ok(FieldSpec::Full {
            ty,
            default: map.get("default").cloned(),
            description,
        })
    }

    fn type_expr(&self) -> Option<&TypeExpr> {
        match self {
            FieldSpec::Full { ty, .. } => ty.as_ref(),
            FieldSpec::Bare(_) => None,
        }
    }

    /// Type name given as the default of a record slot (`default: MediumModel`).
    pub fn default_type_name(&self) -> Option<&str> {
        match self {
            FieldSpec::Full {
                ty: Some(ty),
                default: Some(Value::String(name)),
                ..
            } if ty.is_record() && is_type_name(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

/// Unresolved field type as written in a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Int,
    Float,
    Bool,
    Str,
    Map,
    Any,
    List(Box<TypeExpr>),
    Optional(Box<TypeExpr>),
    /// Reference to another schema type.
    Named(String),
}

impl TypeExpr {
    /// Parse `int`, `list[str]`, `optional[ModelConfig]`, `float?`, ...
    pub fn parse(input: &str) -> std::result::Result<TypeExpr, String> {
        let s = input.trim();
        if let Some(inner) = s.strip_suffix('?') {
            return Ok(TypeExpr::Optional(Box::new(TypeExpr::parse(inner)?)));
        }
        if let Some(inner) = generic_arg(s, "optional") {
            return Ok(TypeExpr::Optional(Box::new(TypeExpr::parse(inner)?)));
        }
        if let Some(inner) = generic_arg(s, "list") {
            return Ok(TypeExpr::List(Box::new(TypeExpr::parse(inner)?)));
        }

        let expr = match s {
            "int" | "integer" => TypeExpr::Int,
            "float" | "number" => TypeExpr::Float,
            "bool" | "boolean" => TypeExpr::Bool,
            "str" | "string" => TypeExpr::Str,
            "map" | "dict" => TypeExpr::Map,
            "any" => TypeExpr::Any,
            "list" => TypeExpr::List(Box::new(TypeExpr::Any)),
            name if is_type_name(name) => TypeExpr::Named(name.to_string()),
            _ => return Err(format!("invalid type expression '{}'", input)),
        };
        Ok(expr)
    }

    /// Whether this names a record slot, possibly optional.
    pub fn is_record(&self) -> bool {
        match self {
            TypeExpr::Named(_) => true,
            TypeExpr::Optional(inner) => inner.is_record(),
            _ => false,
        }
    }

    /// Schema type names this expression refers to.
    pub fn referenced_names(&self, out: &mut Vec<String>) {
        match self {
            TypeExpr::List(inner) | TypeExpr::Optional(inner) => inner.referenced_names(out),
            TypeExpr::Named(name) => out.push(name.clone()),
            _ => {}
        }
    }

    /// Resolve named references into concrete field types.
    pub fn resolve<F>(&self, lookup: &F) -> std::result::Result<FieldType, String>
    where
        F: Fn(&str) -> Option<Arc<SchemaType>>,
    {
        Ok(match self {
            TypeExpr::Int => FieldType::Int,
            TypeExpr::Float => FieldType::Float,
            TypeExpr::Bool => FieldType::Bool,
            TypeExpr::Str => FieldType::Str,
            TypeExpr::Map => FieldType::Map,
            TypeExpr::Any => FieldType::Any,
            TypeExpr::List(inner) => {
                let inner = inner.resolve(lookup)?;
                if inner.config_schema().is_some() {
                    return Err("lists of config records are not supported".to_string());
                }
                FieldType::List(Box::new(inner))
            }
            TypeExpr::Optional(inner) => FieldType::Optional(Box::new(inner.resolve(lookup)?)),
            TypeExpr::Named(name) => {
                FieldType::Config(lookup(name).ok_or_else(|| format!("unknown type '{}'", name))?)
            }
        })
    }
}

fn generic_arg<'a>(s: &'a str, head: &str) -> Option<&'a str> {
    s.strip_prefix(head)?.strip_prefix('[')?.strip_suffix(']')
}

fn is_type_name(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// A type definition read from a file, not yet linked.
#[derive(Debug, Clone)]
pub struct ParsedDefinition {
    pub name: String,
    pub definition: TypeDefinition,
    pub fields: Vec<(String, FieldSpec)>,
}

impl ParsedDefinition {
    /// Names of every schema type this definition needs before it can be built.
    pub fn dependencies(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(parent) = &self.definition.extends {
            out.push(parent.clone());
        }
        for (_, spec) in &self.fields {
            if let Some(expr) = spec.type_expr() {
                expr.referenced_names(&mut out);
            }
            if let Some(name) = spec.default_type_name() {
                out.push(name.to_string());
            }
        }
        out
    }

    /// Build the schema type, resolving names through `lookup`.
    pub fn build<F>(&self, origin: &Path, lookup: &F) -> Result<Arc<SchemaType>>
    where
        F: Fn(&str) -> Option<Arc<SchemaType>>,
    {
        let mut builder = SchemaType::builder(&self.name).origin(origin);

        if let Some(parent_name) = &self.definition.extends {
            let parent = lookup(parent_name).ok_or_else(|| {
                ConfigError::definition(origin, format!("{}: unknown parent type '{}'", self.name, parent_name))
            })?;
            builder = builder.extends(&parent);
        }
        if let Some(description) = &self.definition.description {
            builder = builder.description(description.clone());
        }
        if let Some(extra) = self.definition.extra {
            builder = builder.extra(extra);
        }

        for (field_name, spec) in &self.fields {
            builder = match spec {
                FieldSpec::Full {
                    ty,
                    default,
                    description,
                } => {
                    let ty = ty
                        .as_ref()
                        .map(|expr| expr.resolve(lookup))
                        .transpose()
                        .map_err(|msg| ConfigError::definition(origin, format!("{}.{}: {}", self.name, field_name, msg)))?;
                    match spec.default_type_name() {
                        Some(type_name) => {
                            let default_type = lookup(type_name).ok_or_else(|| {
                                ConfigError::definition(
                                    origin,
                                    format!("{}.{}: unknown default type '{}'", self.name, field_name, type_name),
                                )
                            })?;
                            builder
                                .declare(field_name.clone(), ty, None, description.clone())
                                .default_type(&default_type)
                        }
                        None => builder.declare(field_name.clone(), ty, default.clone(), description.clone()),
                    }
                }
                FieldSpec::Bare(value) => builder.default_value(field_name.clone(), value.clone()),
            };
        }

        builder.build()
    }
}

/// Parse the contents of one definition file.
///
/// Any malformed definition fails the whole file.
pub fn parse_definitions(origin: &Path, content: &str) -> Result<Vec<ParsedDefinition>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let document: Value = serde_yaml::from_str(content)?;
    let map = match document {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => {
            return Err(ConfigError::definition(
                origin,
                format!("expected a mapping of type names, found {}", crate::nested::describe(&other)),
            ));
        }
    };

    let mut parsed = Vec::with_capacity(map.len());
    for (name, body) in map {
        let definition: TypeDefinition = match body {
            Value::Null => TypeDefinition::default(),
            body => serde_json::from_value(body)
                .map_err(|err| ConfigError::definition(origin, format!("{}: {}", name, err)))?,
        };
        let mut fields = Vec::with_capacity(definition.fields.len());
        for (field_name, value) in &definition.fields {
            let spec = FieldSpec::parse(value)
                .map_err(|msg| ConfigError::definition(origin, format!("{}.{}: {}", name, field_name, msg)))?;
            fields.push((field_name.clone(), spec));
        }
        parsed.push(ParsedDefinition {
            name,
            definition,
            fields,
        });
    }
    Ok(parsed)
}
