//! Application entry: discover definitions, parse overrides, build.
//!
//! ```no_run
//! use hierconf::app::ConfigApp;
//!
//! let mut app = ConfigApp::new("TrainConfig").config_dir("configs");
//! let resolved = app.resolve(["--config=quick-test", "model=ViTConfig", "--epochs=3"])?;
//! resolved.log_summary();
//! # Ok::<(), hierconf::error::ConfigError>(())
//! ```

use crate::builder::{self, ResolvedConfig};
use crate::error::{ConfigError, Result};
use crate::overrides::{OverrideParser, ParsedOverrides};
use crate::registry::Registry;
use crate::schema::SchemaType;
use crate::settings::SettingsLoader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// The type a resolution starts from.
#[derive(Debug, Clone)]
pub enum RootSchema {
    /// A type built in code.
    Type(Arc<SchemaType>),
    /// A type looked up in the discovered catalog by name.
    Named(String),
}

impl From<Arc<SchemaType>> for RootSchema {
    fn from(schema: Arc<SchemaType>) -> Self {
        RootSchema::Type(schema)
    }
}

impl From<&str> for RootSchema {
    fn from(name: &str) -> Self {
        RootSchema::Named(name.to_string())
    }
}

impl From<String> for RootSchema {
    fn from(name: String) -> Self {
        RootSchema::Named(name)
    }
}

/// A config-driven application.
#[derive(Debug)]
pub struct ConfigApp {
    root: RootSchema,
    dirs: Vec<PathBuf>,
    registry: Registry,
    discovered: bool,
}

impl ConfigApp {
    pub fn new(root: impl Into<RootSchema>) -> Self {
        Self {
            root: root.into(),
            dirs: Vec::new(),
            registry: Registry::new(),
            discovered: false,
        }
    }

    /// Add a definition directory. Later directories override earlier ones.
    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dirs.push(dir.into());
        self.discovered = false;
        self
    }

    pub fn config_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.dirs.extend(dirs.into_iter().map(Into::into));
        self.discovered = false;
        self
    }

    /// Add the directories named by project settings, relative ones resolved against `base`.
    pub fn with_settings(self, settings: &SettingsLoader, base: &Path) -> Self {
        let dirs = settings.resolve_dirs(base);
        self.config_dirs(dirs)
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Run discovery over every directory once. Returns the number of types registered.
    pub fn discover(&mut self) -> usize {
        if self.discovered {
            return 0;
        }
        let mut registry = Registry::new();
        let mut count = 0;
        for dir in &self.dirs {
            count += registry.discover(dir);
        }
        self.registry = registry;
        self.discovered = true;
        count
    }

    /// The registry, discovering first if needed.
    pub fn registry(&mut self) -> &Registry {
        self.discover();
        &self.registry
    }

    /// The root type, resolving a catalog name if needed.
    pub fn root_schema(&mut self) -> Result<Arc<SchemaType>> {
        self.discover();
        match &self.root {
            RootSchema::Type(schema) => Ok(Arc::clone(schema)),
            RootSchema::Named(name) => self.registry.get_type(name).cloned(),
        }
    }

    /// Classify override tokens against the root type and registry.
    pub fn parse<I, S>(&mut self, tokens: I) -> Result<ParsedOverrides>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let root = self.root_schema()?;
        Ok(OverrideParser::new(&root, &self.registry).parse(tokens))
    }

    /// Resolve a configuration from command-line tokens.
    ///
    /// Unrecognised tokens fail with [`ConfigError::Unrecognized`].
    pub fn resolve<I, S>(&mut self, tokens: I) -> Result<ResolvedConfig>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = self.parse(tokens)?;
        if !parsed.unrecognized.is_empty() {
            return Err(ConfigError::Unrecognized(parsed.unrecognized));
        }
        self.resolve_parsed(&parsed)
    }

    /// Build from already classified overrides.
    pub fn resolve_parsed(&mut self, parsed: &ParsedOverrides) -> Result<ResolvedConfig> {
        let root = self.root_schema()?;
        let selected = match &parsed.variant {
            Some(name) => {
                let variant = Arc::clone(self.registry.get_variant(name)?);
                if !variant.is_subtype_of(&root) {
                    warn!(variant = variant.name(), root = root.name(), "Selected variant does not extend the root type");
                }
                debug!(variant = variant.name(), "Selected variant");
                variant
            }
            None => root,
        };

        let resolved = builder::build(&selected, &self.registry, &parsed.groups, &parsed.fields)?;
        debug!(config = resolved.type_name(), dirs = self.dirs.len(), "Configuration resolved");
        Ok(resolved)
    }

    /// Resolve from tokens and hand the result to `f`.
    pub fn run<I, S, T, F>(&mut self, tokens: I, f: F) -> Result<T>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnOnce(&ResolvedConfig) -> T,
    {
        let resolved = self.resolve(tokens)?;
        Ok(f(&resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "configs/base.yaml",
            r#"
AppConfig:
  fields:
    port: 8000
    debug: false
    host: localhost
    database: { type: DatabaseConfig }

DevConfig:
  extends: AppConfig
  fields:
    debug: true
    port: 8080
"#,
        );
        write(
            temp.path(),
            "configs/types.yaml",
            "DatabaseConfig:\n  fields:\n    url: sqlite://memory\n",
        );
        write(
            temp.path(),
            "configs/database/postgres.yaml",
            "PostgresConfig:\n  fields:\n    host: localhost\n    port: 5432\n",
        );
        temp
    }

    #[test]
    fn test_resolve_named_root() {
        let temp = project();
        let mut app = ConfigApp::new("AppConfig").config_dir(temp.path().join("configs"));

        let resolved = app
            .resolve(["--config=dev-config", "database=PostgresConfig", "--database.port=6543"])
            .unwrap();
        assert_eq!(resolved.type_name(), "DevConfig");
        assert_eq!(resolved.config().value("debug"), Some(&json!(true)));
        let db = resolved.config().record("database").unwrap();
        assert_eq!(db.type_name(), "PostgresConfig");
        assert_eq!(db.value("port"), Some(&json!(6543)));
    }

    #[test]
    fn test_unrecognized_tokens_fail() {
        let temp = project();
        let mut app = ConfigApp::new("AppConfig").config_dir(temp.path().join("configs"));
        let err = app.resolve(["stray"]).unwrap_err();
        assert!(matches!(err, ConfigError::Unrecognized(ref tokens) if tokens == &["stray"]));
    }

    #[test]
    fn test_missing_root_type() {
        let mut app = ConfigApp::new("Nope");
        assert!(app.resolve(Vec::<String>::new()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_in_code_root_with_missing_dirs() {
        let root = SchemaType::builder("Plain")
            .field("n", FieldType::Int, 1)
            .build()
            .unwrap();
        let mut app = ConfigApp::new(root).config_dir("/nonexistent/hierconf");
        let value = app.run(["--n=4"], |resolved| resolved.config().value("n").cloned()).unwrap();
        assert_eq!(value, Some(json!(4)));
        assert!(app.registry().list_groups().is_empty());
    }

    #[test]
    fn test_later_dirs_override_earlier() {
        let temp = project();
        write(
            temp.path(),
            "local/database/postgres.yaml",
            "PostgresConfig:\n  fields:\n    host: db.internal\n    port: 5432\n",
        );
        let mut app = ConfigApp::new("AppConfig")
            .config_dirs([temp.path().join("configs"), temp.path().join("local")]);

        let resolved = app.resolve(["database=PostgresConfig"]).unwrap();
        assert_eq!(resolved.get("database.host").and_then(|v| v.as_value().cloned()), Some(json!("db.internal")));
    }
}
