//! Schema model: named record types with typed, defaulted fields.
//!
//! A [`SchemaType`] is what the registry classifies and the builder
//! instantiates. Types are shared as `Arc<SchemaType>` and compared by pointer
//! identity, so two definitions with the same name are never confused.
//!
//! Nested records are declared as [`FieldType::Config`] slots. The declared
//! type supplies the default and the shape used to rebuild nested maps, but
//! the slot accepts a record of any schema type. Group swaps rely on this to
//! replace a whole subtree with an unrelated type.

mod coerce;
mod instance;

pub use instance::{ConfigInstance, FieldValue};

use crate::error::{ConfigError, Result};
use crate::merge::deep_merge;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Declared type of a field.
#[derive(Debug, Clone)]
pub enum FieldType {
    Int,
    Float,
    Bool,
    Str,
    /// Homogeneous list of a non-record type.
    List(Box<FieldType>),
    /// Free-form mapping.
    Map,
    /// Anything, stored as given.
    Any,
    /// `null` or the inner type.
    Optional(Box<FieldType>),
    /// Nested record slot; the schema is the default type of the slot.
    Config(Arc<SchemaType>),
}

impl FieldType {
    /// Infer a field type from a default value.
    pub fn infer(value: &Value) -> FieldType {
        match value {
            Value::Bool(_) => FieldType::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => FieldType::Int,
            Value::Number(_) => FieldType::Float,
            Value::String(_) => FieldType::Str,
            Value::Array(_) => FieldType::List(Box::new(FieldType::Any)),
            Value::Object(_) => FieldType::Map,
            Value::Null => FieldType::Any,
        }
    }

    /// The schema behind a `Config` slot, looking through `Optional`.
    pub fn config_schema(&self) -> Option<&Arc<SchemaType>> {
        match self {
            FieldType::Config(schema) => Some(schema),
            FieldType::Optional(inner) => inner.config_schema(),
            _ => None,
        }
    }

    /// Default used when a declaration omits one.
    fn implicit_default(&self) -> Option<Value> {
        match self {
            FieldType::Config(_) => Some(Value::Object(Map::new())),
            FieldType::Optional(_) | FieldType::Any => Some(Value::Null),
            _ => None,
        }
    }
}

impl PartialEq for FieldType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldType::Int, FieldType::Int)
            | (FieldType::Float, FieldType::Float)
            | (FieldType::Bool, FieldType::Bool)
            | (FieldType::Str, FieldType::Str)
            | (FieldType::Map, FieldType::Map)
            | (FieldType::Any, FieldType::Any) => true,
            (FieldType::List(a), FieldType::List(b)) => a == b,
            (FieldType::Optional(a), FieldType::Optional(b)) => a == b,
            (FieldType::Config(a), FieldType::Config(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "int"),
            FieldType::Float => write!(f, "float"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::Str => write!(f, "str"),
            FieldType::List(inner) if **inner == FieldType::Any => write!(f, "list"),
            FieldType::List(inner) => write!(f, "list[{}]", inner),
            FieldType::Map => write!(f, "map"),
            FieldType::Any => write!(f, "any"),
            FieldType::Optional(inner) => write!(f, "optional[{}]", inner),
            FieldType::Config(schema) => write!(f, "{}", schema.name()),
        }
    }
}

/// What to do with input keys that match no declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraPolicy {
    /// Drop unknown keys (default).
    #[default]
    Ignore,
    /// Keep unknown keys after the declared fields.
    Allow,
    /// Reject unknown keys with a validation error.
    Forbid,
}

/// A single field declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    /// Default value. For `Config` slots this is a (possibly empty) map of
    /// overrides applied on top of the slot type's own defaults.
    pub default: Value,
    /// For `Config` slots, a type other than the declared one that the
    /// default record is built from.
    pub default_type: Option<Arc<SchemaType>>,
    pub description: Option<String>,
}

/// A named record type with an ordered set of typed, defaulted fields.
#[derive(Debug)]
pub struct SchemaType {
    name: String,
    description: Option<String>,
    parent: Option<Arc<SchemaType>>,
    fields: Vec<FieldDef>,
    extra: ExtraPolicy,
    origin: Option<PathBuf>,
}

impl SchemaType {
    /// Start declaring a new schema type.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            description: None,
            parent: None,
            fields: Vec::new(),
            extra: None,
            origin: None,
        }
    }

    /// Simple name of the type.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Immediate parent schema, if this type extends another one.
    pub fn parent(&self) -> Option<&Arc<SchemaType>> {
        self.parent.as_ref()
    }

    /// Whether this type extends another schema type rather than only the base.
    pub fn is_variant(&self) -> bool {
        self.parent.is_some()
    }

    /// Whether `other` is this type or one of its ancestors.
    pub fn is_subtype_of(&self, other: &SchemaType) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.parent
            .as_ref()
            .is_some_and(|parent| parent.is_subtype_of(other))
    }

    /// Effective field declarations, inherited ones first.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn extra(&self) -> ExtraPolicy {
        self.extra
    }

    /// File the type was defined in, when it came from discovery.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Instantiate with every field at its default.
    pub fn default_instance(self: &Arc<Self>) -> Result<ConfigInstance> {
        self.instantiate_fields(Vec::new())
    }

    /// Instantiate from a plain mapping, validating and coercing every field.
    pub fn instantiate(self: &Arc<Self>, values: &Map<String, Value>) -> Result<ConfigInstance> {
        self.instantiate_at(values, "")
    }

    /// Like [`instantiate`](Self::instantiate), with error paths reported under `prefix`.
    pub fn instantiate_at(self: &Arc<Self>, values: &Map<String, Value>, prefix: &str) -> Result<ConfigInstance> {
        let input = values
            .iter()
            .map(|(k, v)| (k.clone(), FieldValue::Value(v.clone())))
            .collect();
        instance::instantiate(self, input, prefix)
    }

    /// Instantiate from field values that may already hold typed records.
    ///
    /// Later duplicates of a key replace earlier ones.
    pub fn instantiate_fields(self: &Arc<Self>, input: Vec<(String, FieldValue)>) -> Result<ConfigInstance> {
        instance::instantiate(self, input, "")
    }
}

impl PartialEq for SchemaType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug)]
struct PendingField {
    name: String,
    ty: Option<FieldType>,
    default: Option<Value>,
    default_type: Option<Arc<SchemaType>>,
    description: Option<String>,
}

/// Builder for [`SchemaType`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    description: Option<String>,
    parent: Option<Arc<SchemaType>>,
    fields: Vec<PendingField>,
    extra: Option<ExtraPolicy>,
    origin: Option<PathBuf>,
}

impl SchemaBuilder {
    /// Extend another schema type, inheriting its fields.
    pub fn extends(mut self, parent: &Arc<SchemaType>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare (or redeclare) a field with an explicit type and default.
    pub fn field(mut self, name: impl Into<String>, ty: FieldType, default: impl Into<Value>) -> Self {
        self.fields.push(PendingField {
            name: name.into(),
            ty: Some(ty),
            default: Some(default.into()),
            default_type: None,
            description: None,
        });
        self
    }

    /// Declare a nested record slot defaulting to `schema`'s defaults.
    pub fn config_field(mut self, name: impl Into<String>, schema: &Arc<SchemaType>) -> Self {
        self.fields.push(PendingField {
            name: name.into(),
            ty: Some(FieldType::Config(Arc::clone(schema))),
            default: None,
            default_type: None,
            description: None,
        });
        self
    }

    /// Override the default of a field, keeping its inherited type.
    ///
    /// For fields that are not inherited the type is inferred from the value.
    pub fn default_value(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.fields.push(PendingField {
            name: name.into(),
            ty: None,
            default: Some(default.into()),
            default_type: None,
            description: None,
        });
        self
    }

    /// Fully general declaration; any part left `None` is inherited or implied.
    pub fn declare(
        mut self,
        name: impl Into<String>,
        ty: Option<FieldType>,
        default: Option<Value>,
        description: Option<String>,
    ) -> Self {
        self.fields.push(PendingField {
            name: name.into(),
            ty,
            default,
            default_type: None,
            description,
        });
        self
    }

    /// Attach a description to the most recently declared field.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.description = Some(description.into());
        }
        self
    }

    /// Build the most recently declared record slot from `schema` by default.
    ///
    /// The slot keeps its declared type; any map default overlays `schema`'s
    /// own defaults.
    pub fn default_type(mut self, schema: &Arc<SchemaType>) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.default_type = Some(Arc::clone(schema));
        }
        self
    }

    /// Policy for unknown keys; inherited from the parent when unset.
    pub fn extra(mut self, policy: ExtraPolicy) -> Self {
        self.extra = Some(policy);
        self
    }

    pub fn origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Resolve inheritance and validate every default.
    pub fn build(self) -> Result<Arc<SchemaType>> {
        let mut fields: Vec<FieldDef> = self
            .parent
            .as_ref()
            .map(|parent| parent.fields.clone())
            .unwrap_or_default();

        for pending in self.fields {
            match fields.iter().position(|f| f.name == pending.name) {
                Some(index) => {
                    let field = redeclare(&self.name, &fields[index], pending)?;
                    fields[index] = field;
                }
                None => fields.push(declare_new(&self.name, pending)?),
            }
        }

        let extra = self
            .extra
            .or_else(|| self.parent.as_ref().map(|p| p.extra))
            .unwrap_or_default();

        let schema = Arc::new(SchemaType {
            name: self.name,
            description: self.description,
            parent: self.parent,
            fields,
            extra,
            origin: self.origin,
        });

        // Defaults must satisfy their own declared types.
        schema.default_instance().map_err(|err| match err {
            ConfigError::Validation { .. } => err,
            other => ConfigError::validation(schema.name(), format!("invalid default: {}", other)),
        })?;

        Ok(schema)
    }
}

fn redeclare(owner: &str, inherited: &FieldDef, pending: PendingField) -> Result<FieldDef> {
    let ty = pending.ty.unwrap_or_else(|| inherited.ty.clone());
    let same_type = ty == inherited.ty;
    check_default_type(owner, &pending.name, &ty, pending.default_type.as_ref())?;

    if let Some(default_type) = pending.default_type {
        return Ok(FieldDef {
            name: pending.name,
            ty,
            default: pending.default.unwrap_or_else(|| Value::Object(Map::new())),
            default_type: Some(default_type),
            description: pending.description.or_else(|| inherited.description.clone()),
        });
    }

    let default = match pending.default {
        // Partial record defaults layer over the inherited ones.
        Some(default @ Value::Object(_)) if same_type && ty.config_schema().is_some() => {
            deep_merge(inherited.default.clone(), default)
        }
        Some(default) => default,
        None if same_type => inherited.default.clone(),
        None => ty.implicit_default().ok_or_else(|| {
            ConfigError::validation(
                owner,
                format!("field '{}' changes type to {} without a default", pending.name, ty),
            )
        })?,
    };

    Ok(FieldDef {
        name: pending.name,
        default_type: if same_type { inherited.default_type.clone() } else { None },
        ty,
        default,
        description: pending.description.or_else(|| inherited.description.clone()),
    })
}

fn check_default_type(owner: &str, field: &str, ty: &FieldType, default_type: Option<&Arc<SchemaType>>) -> Result<()> {
    if default_type.is_some() && ty.config_schema().is_none() {
        return Err(ConfigError::validation(
            owner,
            format!("field '{}' of type {} cannot take a default record type", field, ty),
        ));
    }
    Ok(())
}

fn declare_new(owner: &str, pending: PendingField) -> Result<FieldDef> {
    let default_type = pending.default_type;
    let (ty, default) = match (pending.ty, pending.default) {
        (Some(ty), Some(default)) => (ty, default),
        (Some(ty), None) if default_type.is_some() => (ty, Value::Object(Map::new())),
        (Some(ty), None) => {
            let default = ty.implicit_default().ok_or_else(|| {
                ConfigError::validation(owner, format!("field '{}' has no default", pending.name))
            })?;
            (ty, default)
        }
        (None, Some(default)) => (FieldType::infer(&default), default),
        (None, None) => {
            return Err(ConfigError::validation(
                owner,
                format!("field '{}' declares neither a type nor a default", pending.name),
            ));
        }
    };

    check_default_type(owner, &pending.name, &ty, default_type.as_ref())?;

    Ok(FieldDef {
        name: pending.name,
        ty,
        default,
        default_type,
        description: pending.description,
    })
}
