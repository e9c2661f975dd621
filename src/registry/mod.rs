//! Registry of discovered configuration types.
//!
//! Manages two lookup tables built from a directory tree of definitions:
//! 1. **Groups**: types defined in a subdirectory (`configs/model/*.yaml`)
//!    become members of the group named after that directory, keyed by their
//!    own type name.
//! 2. **Variants**: types that extend another config type
//!    (`QuickTest extends TrainConfig`) become selectable by their kebab-case
//!    name (`quick-test`).
//!
//! A type can be both. Every discovered type also enters a catalog keyed by
//! its simple name, which later definition files can reference.

pub mod definition;
pub mod loader;

pub use loader::DefinitionLoader;

use crate::error::{ConfigError, LookupKind, Result};
use crate::naming::camel_to_kebab;
use crate::schema::SchemaType;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// A type produced by one definition file.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// File the type was defined in.
    pub origin: PathBuf,
    /// Simple type name.
    pub name: String,
    pub schema: Arc<SchemaType>,
}

/// Group and variant tables for one resolution pass.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    groups: BTreeMap<String, BTreeMap<String, Arc<SchemaType>>>,
    variants: BTreeMap<String, Arc<SchemaType>>,
    catalog: BTreeMap<String, Arc<SchemaType>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover and register every definition under `root`.
    ///
    /// Files that fail to load are skipped; a missing directory is a no-op.
    /// Repeated calls merge into the same tables, later entries overwriting
    /// same-keyed earlier ones. Returns the number of types registered.
    pub fn discover(&mut self, root: impl AsRef<Path>) -> usize {
        let root = root.as_ref();
        if !root.is_dir() {
            debug!(root = %root.display(), "Config directory does not exist, skipping");
            return 0;
        }

        let entries = DefinitionLoader::new(&self.catalog).load_dir(root);
        let count = entries.len();
        self.register_entries(root, entries);
        info!(root = %root.display(), count, "Discovered config types");
        count
    }

    /// Classify and register an explicit list of entries as if found under `root`.
    pub fn register_entries(&mut self, root: &Path, entries: impl IntoIterator<Item = RegistryEntry>) {
        for entry in entries {
            self.register_type(&entry.schema);

            if let Some(group) = group_name(root, &entry.origin) {
                self.register_group(&group, &entry.name, Arc::clone(&entry.schema));
            }
            if entry.schema.is_variant() {
                self.register_variant(&entry.name, Arc::clone(&entry.schema));
            }
        }
    }

    /// Register a type in a group, replacing any member with the same name.
    pub fn register_group(&mut self, group: &str, name: &str, schema: Arc<SchemaType>) {
        debug!(group, name, "Registered group member");
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(name.to_string(), schema);
    }

    /// Register a named variant. The name is normalised to kebab-case.
    pub fn register_variant(&mut self, name: &str, schema: Arc<SchemaType>) {
        let key = camel_to_kebab(name);
        debug!(variant = %key, schema = schema.name(), "Registered variant");
        self.variants.insert(key, schema);
    }

    /// Make a type resolvable by name for definitions and `get_type`.
    pub fn register_type(&mut self, schema: &Arc<SchemaType>) {
        self.catalog.insert(schema.name().to_string(), Arc::clone(schema));
    }

    /// Get a member of a group.
    pub fn get_group(&self, group: &str, name: &str) -> Result<&Arc<SchemaType>> {
        let members = self
            .groups
            .get(group)
            .ok_or_else(|| ConfigError::not_found(LookupKind::Group, group, self.groups.keys().cloned()))?;
        members
            .get(name)
            .ok_or_else(|| ConfigError::member_not_found(group, name, members.keys().cloned()))
    }

    /// Get a variant by name; `QuickTest` and `quick-test` are the same key.
    pub fn get_variant(&self, name: &str) -> Result<&Arc<SchemaType>> {
        self.variants
            .get(&camel_to_kebab(name))
            .ok_or_else(|| ConfigError::not_found(LookupKind::Variant, name, self.variants.keys().cloned()))
    }

    /// Get any known type by its simple name.
    pub fn get_type(&self, name: &str) -> Result<&Arc<SchemaType>> {
        self.catalog
            .get(name)
            .ok_or_else(|| ConfigError::not_found(LookupKind::Type, name, self.catalog.keys().cloned()))
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// Group names mapped to their member names.
    pub fn list_groups(&self) -> BTreeMap<String, Vec<String>> {
        self.groups
            .iter()
            .map(|(group, members)| (group.clone(), members.keys().cloned().collect()))
            .collect()
    }

    /// Variant keys.
    pub fn list_variants(&self) -> Vec<String> {
        self.variants.keys().cloned().collect()
    }

    /// Names of every known type.
    pub fn list_types(&self) -> Vec<String> {
        self.catalog.keys().cloned().collect()
    }

    /// Catalog of known types, used to link new definitions.
    pub fn catalog(&self) -> &BTreeMap<String, Arc<SchemaType>> {
        &self.catalog
    }
}

/// Group of a definition: the immediate parent directory, unless that is the root.
fn group_name(root: &Path, origin: &Path) -> Option<String> {
    let parent = origin.parent()?;
    if parent == root {
        return None;
    }
    parent.file_name()?.to_str().map(str::to_string)
}
