//! Structured error types for configuration resolution.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// What kind of lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// A config group (e.g. `model`).
    Group,
    /// A member inside an existing group.
    GroupMember,
    /// A named variant.
    Variant,
    /// A schema type in the catalog.
    Type,
    /// A key inside a nested map.
    Key,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKind::Group => write!(f, "config group"),
            LookupKind::GroupMember => write!(f, "config"),
            LookupKind::Variant => write!(f, "config variant"),
            LookupKind::Type => write!(f, "config type"),
            LookupKind::Key => write!(f, "key"),
        }
    }
}

/// Errors raised while discovering, building or exporting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unknown group, group member, variant, type or path segment.
    ///
    /// Always carries the alternatives available at the failing level.
    #[error("{kind} '{name}' not found{}. Available: [{}]", scope_suffix(.scope), .available.join(", "))]
    NotFound {
        kind: LookupKind,
        name: String,
        /// Enclosing scope, e.g. the group name for a missing member.
        scope: Option<String>,
        available: Vec<String>,
    },

    /// A value could not be placed at, or coerced to, the requested location.
    #[error("type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    /// A schema rejected the data it was instantiated with.
    #[error("validation failed for {type_name}: {message}")]
    Validation { type_name: String, message: String },

    /// A definition file could not be turned into schema types.
    #[error("invalid definition in {}: {message}", .origin.display())]
    Definition { origin: PathBuf, message: String },

    /// Override tokens that matched no recognised form.
    #[error("unrecognized override(s): {}", .0.join(" "))]
    Unrecognized(Vec<String>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

fn scope_suffix(scope: &Option<String>) -> String {
    match scope {
        Some(scope) => format!(" in group '{}'", scope),
        None => String::new(),
    }
}

impl ConfigError {
    pub fn not_found(
        kind: LookupKind,
        name: impl Into<String>,
        available: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
            scope: None,
            available: available.into_iter().map(Into::into).collect(),
        }
    }

    pub fn member_not_found(
        group: &str,
        name: impl Into<String>,
        available: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::NotFound {
            kind: LookupKind::GroupMember,
            name: name.into(),
            scope: Some(group.to_string()),
            available: available.into_iter().map(Into::into).collect(),
        }
    }

    pub fn type_mismatch(
        path: impl Into<String>,
        expected: impl fmt::Display,
        found: impl fmt::Display,
    ) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn validation(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub fn definition(origin: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Definition {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Whether this is a lookup failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::NotFound { .. })
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
