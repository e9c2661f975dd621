//! Project settings with tier-based merging.
//!
//! Settings decide where definition directories are looked up. They are
//! loaded from several tiers and merged field-by-field:
//!
//! 1. Built-in defaults
//! 2. User rc file (`~/.hierconfrc`, or `$HIERCONF_USER_DIR/.hierconfrc`)
//! 3. Project manifest: `[package.metadata.hierconf]` (or
//!    `[workspace.metadata.hierconf]`) in the nearest `Cargo.toml`
//! 4. Project rc file (the nearest `.hierconfrc` in the working directory or a parent)
//! 5. `HIERCONF_CONFIG_DIRS` (highest priority)
//!
//! Directory entries may use `$ROOT` (the project root) and `$CWD`.

use crate::merge::deep_merge_all;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the rc file at project and user level.
pub const RC_FILE: &str = ".hierconfrc";

/// Manifest whose `metadata.hierconf` table holds settings.
pub const MANIFEST_FILE: &str = "Cargo.toml";

const MANIFEST_SECTION: &str = "hierconf";

/// Path list overriding `config_dirs`, separated like `PATH`.
pub const CONFIG_DIRS_ENV: &str = "HIERCONF_CONFIG_DIRS";

/// Directory holding the user-level rc file.
pub const USER_DIR_ENV: &str = "HIERCONF_USER_DIR";

const ROOT_VAR: &str = "$ROOT";
const CWD_VAR: &str = "$CWD";

/// Settings tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SettingsTier {
    Defaults = 0,
    User = 1,
    Manifest = 2,
    Project = 3,
    Environment = 4,
}

impl std::fmt::Display for SettingsTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsTier::Defaults => write!(f, "defaults"),
            SettingsTier::User => write!(f, "user"),
            SettingsTier::Manifest => write!(f, "manifest"),
            SettingsTier::Project => write!(f, "project"),
            SettingsTier::Environment => write!(f, "environment"),
        }
    }
}

/// Merged project settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Definition directories, discovered in order; later ones override earlier ones.
    pub config_dirs: Vec<String>,
    /// File names marking the project root.
    pub root_markers: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_dirs: vec![
                format!("{}/configs", ROOT_VAR),
                format!("{}/configs", CWD_VAR),
                "configs".to_string(),
            ],
            root_markers: vec![RC_FILE.to_string(), MANIFEST_FILE.to_string()],
        }
    }
}

/// Inputs for each tier.
#[derive(Debug, Clone)]
pub struct SettingsPaths {
    /// Working directory; the project rc file is searched from here upwards.
    pub cwd: PathBuf,
    /// Directory holding the user rc file.
    pub user_dir: Option<PathBuf>,
    /// Raw value of `HIERCONF_CONFIG_DIRS`, if set.
    pub env_config_dirs: Option<OsString>,
}

impl SettingsPaths {
    /// Discover tier inputs from the process environment.
    pub fn discover() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine working directory")?;

        // User dir: HIERCONF_USER_DIR or the home directory
        let user_dir = std::env::var_os(USER_DIR_ENV)
            .map(PathBuf::from)
            .or_else(dirs::home_dir);

        Ok(Self {
            cwd,
            user_dir,
            env_config_dirs: std::env::var_os(CONFIG_DIRS_ENV),
        })
    }

    /// Create paths with explicit directories and no environment override.
    pub fn with_dirs(cwd: impl Into<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            user_dir,
            env_config_dirs: None,
        }
    }

    /// Set the `HIERCONF_CONFIG_DIRS` value explicitly.
    pub fn with_env_config_dirs(mut self, value: impl Into<OsString>) -> Self {
        self.env_config_dirs = Some(value.into());
        self
    }
}

/// Settings loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    paths: SettingsPaths,
    settings: Settings,
    root: PathBuf,
    sources: Vec<(SettingsTier, PathBuf)>,
}

impl SettingsLoader {
    /// Load settings from all tiers of the current process.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(SettingsPaths::discover()?)
    }

    /// Load settings with explicit tier inputs.
    pub fn load_with_paths(paths: SettingsPaths) -> Result<Self> {
        let mut layers: Vec<Value> = vec![serde_json::to_value(Settings::default())?];
        let mut sources = Vec::new();

        let project_rc = find_upwards(&paths.cwd, RC_FILE);

        // User tier
        if let Some(user_dir) = &paths.user_dir {
            let rc = user_dir.join(RC_FILE);
            // A home rc found by the upward search is only applied once, as project.
            if rc.is_file() && project_rc.as_deref() != Some(rc.as_path()) {
                if let Some(layer) = read_layer(&rc) {
                    layers.push(layer);
                    sources.push((SettingsTier::User, rc));
                }
            }
        }

        // Manifest tier
        if let Some(manifest) = find_upwards(&paths.cwd, MANIFEST_FILE)
            && let Some(layer) = read_manifest_layer(&manifest)
        {
            layers.push(layer);
            sources.push((SettingsTier::Manifest, manifest));
        }

        // Project tier
        if let Some(rc) = project_rc {
            if let Some(layer) = read_layer(&rc) {
                layers.push(layer);
                sources.push((SettingsTier::Project, rc));
            }
        }

        let mut settings: Settings =
            serde_json::from_value(deep_merge_all(layers)).context("Invalid settings")?;

        // Environment tier
        if let Some(raw) = &paths.env_config_dirs {
            let dirs: Vec<String> = std::env::split_paths(raw)
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
            if !dirs.is_empty() {
                settings.config_dirs = dirs;
                sources.push((SettingsTier::Environment, PathBuf::from(CONFIG_DIRS_ENV)));
            }
        }

        let root = find_root(&paths.cwd, &settings.root_markers);
        debug!(root = %root.display(), dirs = ?settings.config_dirs, "Loaded settings");

        Ok(Self {
            paths,
            settings,
            root,
            sources,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Project root: nearest ancestor of the working directory holding a root marker.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cwd(&self) -> &Path {
        &self.paths.cwd
    }

    /// Tiers that contributed beyond the defaults, lowest first.
    pub fn sources(&self) -> &[(SettingsTier, PathBuf)] {
        &self.sources
    }

    /// Definition directories with variables substituted.
    ///
    /// Relative entries are resolved against `base`.
    pub fn resolve_dirs(&self, base: &Path) -> Vec<PathBuf> {
        self.settings
            .config_dirs
            .iter()
            .map(|dir| {
                let path = PathBuf::from(substitute_variables(dir, &self.paths.cwd, &self.root));
                if path.is_absolute() { path } else { base.join(path) }
            })
            .collect()
    }
}

/// Replace `$ROOT` and `$CWD` in a directory entry.
pub fn substitute_variables(entry: &str, cwd: &Path, root: &Path) -> String {
    entry
        .replace(ROOT_VAR, &root.to_string_lossy())
        .replace(CWD_VAR, &cwd.to_string_lossy())
}

/// Nearest ancestor of `start` (inclusive) holding any marker; `start` itself otherwise.
pub fn find_root(start: &Path, markers: &[String]) -> PathBuf {
    start
        .ancestors()
        .find(|dir| markers.iter().any(|marker| dir.join(marker).exists()))
        .unwrap_or(start)
        .to_path_buf()
}

fn find_upwards(start: &Path, file_name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
}

fn read_layer(path: &Path) -> Option<Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Failed to read settings file");
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(Value::Null) => None,
        Ok(value @ Value::Object(_)) => Some(value),
        Ok(_) => {
            warn!(path = %path.display(), "Ignoring settings file that is not a mapping");
            None
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Ignoring malformed settings file");
            None
        }
    }
}

/// The `metadata.hierconf` table of a manifest, if it has one.
fn read_manifest_layer(path: &Path) -> Option<Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Failed to read manifest");
            return None;
        }
    };
    let manifest: toml::Value = match toml::from_str(&content) {
        Ok(manifest) => manifest,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Ignoring malformed manifest");
            return None;
        }
    };
    let section = ["package", "workspace"]
        .iter()
        .find_map(|table| manifest.get(*table)?.get("metadata")?.get(MANIFEST_SECTION))?;

    match serde_json::to_value(section) {
        Ok(value @ Value::Object(_)) => Some(value),
        Ok(_) => {
            warn!(path = %path.display(), "Ignoring manifest settings that are not a table");
            None
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Ignoring unreadable manifest settings");
            None
        }
    }
}
