//! List and show subcommands.

use crate::format::{format_registry_markdown, format_schema_markdown};
use crate::registry::Registry;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the show subcommand
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Config type name
    pub name: String,
}

fn discover_all(dirs: &[PathBuf]) -> Registry {
    let mut registry = Registry::new();
    for dir in dirs {
        registry.discover(dir);
    }
    registry
}

/// Render every discovered group, member and variant.
pub fn run_list(dirs: &[PathBuf]) -> String {
    format_registry_markdown(&discover_all(dirs))
}

/// Render one type's effective fields.
pub fn run_show(dirs: &[PathBuf], args: &ShowArgs) -> Result<String> {
    let registry = discover_all(dirs);
    let schema = registry.get_type(&args.name)?;
    Ok(format_schema_markdown(schema))
}
