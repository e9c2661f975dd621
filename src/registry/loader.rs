//! Turns a directory of definition files into registry entries.
//!
//! Loading is two-phase. Every file is parsed first; definitions are then
//! built in dependency order so a variant in one file can extend a type from
//! another. A file that fails to parse, or a definition that cannot be linked
//! or validated, is logged and skipped without affecting the rest.

use super::RegistryEntry;
use super::definition::{ParsedDefinition, parse_definitions};
use crate::naming::is_private;
use crate::schema::SchemaType;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

const DEFINITION_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Loads definition files, resolving names against already-known types.
#[derive(Debug)]
pub struct DefinitionLoader<'a> {
    known: &'a BTreeMap<String, Arc<SchemaType>>,
}

struct Pending {
    origin: PathBuf,
    parsed: ParsedDefinition,
}

impl<'a> DefinitionLoader<'a> {
    /// Create a loader that can link against `known` types.
    pub fn new(known: &'a BTreeMap<String, Arc<SchemaType>>) -> Self {
        Self { known }
    }

    /// Load every definition under `root`, in sorted path order.
    ///
    /// Never fails: a missing directory yields no entries.
    pub fn load_dir(&self, root: &Path) -> Vec<RegistryEntry> {
        let mut pending = Vec::new();
        for path in definition_files(root) {
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Skipping unreadable definition file");
                    continue;
                }
            };
            match parse_definitions(&path, &content) {
                Ok(parsed) => pending.extend(parsed.into_iter().map(|parsed| Pending {
                    origin: path.clone(),
                    parsed,
                })),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Skipping definition file that failed to load");
                }
            }
        }
        self.link(pending)
    }

    fn link(&self, pending: Vec<Pending>) -> Vec<RegistryEntry> {
        let mut slots: Vec<Option<Pending>> = pending.into_iter().map(Some).collect();
        let mut built: BTreeMap<String, Arc<SchemaType>> = BTreeMap::new();
        let mut failed: BTreeSet<String> = BTreeSet::new();
        let mut entries = Vec::new();

        loop {
            let waiting: BTreeSet<String> = slots
                .iter()
                .flatten()
                .map(|p| p.parsed.name.clone())
                .collect();
            let mut progressed = false;

            for slot in slots.iter_mut() {
                let Some(item) = slot.as_ref() else { continue };
                let ready = item.parsed.dependencies().iter().all(|dep| {
                    !waiting.contains(dep)
                        && !failed.contains(dep)
                        && (built.contains_key(dep) || self.known.contains_key(dep))
                });
                if !ready {
                    continue;
                }

                let Some(item) = slot.take() else { continue };
                progressed = true;
                let lookup = |name: &str| built.get(name).or_else(|| self.known.get(name)).cloned();
                match item.parsed.build(&item.origin, &lookup) {
                    Ok(schema) => {
                        debug!(
                            name = schema.name(),
                            path = %item.origin.display(),
                            variant = schema.is_variant(),
                            "Loaded config type"
                        );
                        built.insert(item.parsed.name.clone(), Arc::clone(&schema));
                        entries.push(RegistryEntry {
                            origin: item.origin,
                            name: item.parsed.name,
                            schema,
                        });
                    }
                    Err(err) => {
                        warn!(
                            name = %item.parsed.name,
                            path = %item.origin.display(),
                            error = %err,
                            "Skipping config type that failed to build"
                        );
                        failed.insert(item.parsed.name);
                    }
                }
            }

            if !progressed {
                break;
            }
        }

        for item in slots.into_iter().flatten() {
            let missing: Vec<String> = item
                .parsed
                .dependencies()
                .into_iter()
                .filter(|dep| !built.contains_key(dep) && !self.known.contains_key(dep))
                .collect();
            warn!(
                name = %item.parsed.name,
                path = %item.origin.display(),
                missing = ?missing,
                "Skipping config type with unresolved or cyclic references"
            );
        }

        entries
    }
}

/// Definition files under `root`, skipping private files and directories.
pub fn definition_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_str().is_some_and(is_private)
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(error = %err, "Skipping unreadable path during discovery");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| DEFINITION_EXTENSIONS.contains(&ext))
        })
        .collect()
}
