//! Resolve subcommand: build a configuration from override tokens and print it.

use crate::app::ConfigApp;
use crate::format::{OutputFormat, format_resolved};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the resolve subcommand
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Root config type, by name
    #[arg(short, long, value_name = "NAME")]
    pub schema: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,

    /// Also write the resolved configuration as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Override tokens: `--config=NAME`, `GROUP=MEMBER`, `--path.to.field=VALUE`
    #[arg(last = true, value_name = "TOKENS")]
    pub tokens: Vec<String>,
}

/// Run the resolve command, returning the rendered configuration.
pub fn run_resolve(dirs: &[PathBuf], args: &ResolveArgs) -> Result<String> {
    let mut app = ConfigApp::new(args.schema.as_str()).config_dirs(dirs.iter().cloned());
    let resolved = app
        .resolve(&args.tokens)
        .with_context(|| format!("Failed to resolve '{}'", args.schema))?;
    resolved.log_summary();

    if let Some(path) = &args.export {
        resolved
            .export(path)
            .with_context(|| format!("Failed to export to {}", path.display()))?;
    }

    format_resolved(&resolved, args.format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn demo_dirs() -> Vec<PathBuf> {
        vec![Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/multi_class_file/configs")]
    }

    fn args(tokens: &[&str]) -> ResolveArgs {
        ResolveArgs {
            schema: "TrainConfig".to_string(),
            format: OutputFormat::Json,
            export: None,
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_run_resolve_renders_json() {
        let output = run_resolve(&demo_dirs(), &args(&["model=SmallModel", "--epochs=3"])).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["epochs"], 3);
        assert_eq!(value["model"]["__typename__"], "SmallModel");
    }

    #[test]
    fn test_run_resolve_exports() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("resolved.json");
        let mut args = args(&[]);
        args.export = Some(path.clone());
        run_resolve(&demo_dirs(), &args).unwrap();
        let exported = std::fs::read_to_string(path).unwrap();
        assert!(exported.contains("MediumModel"));
    }

    #[test]
    fn test_run_resolve_reports_schema_on_failure() {
        let err = run_resolve(&demo_dirs(), &args(&["model=HugeModel"])).unwrap_err();
        assert!(format!("{:#}", err).starts_with("Failed to resolve 'TrainConfig'"));
    }
}
