//! Output formatting for resolved configs, registries and schema types.

use crate::builder::ResolvedConfig;
use crate::registry::Registry;
use crate::schema::SchemaType;
use anyhow::Result;
use clap::ValueEnum;

/// Output format for the resolved configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

/// Render the export form of a resolved configuration.
pub fn format_resolved(resolved: &ResolvedConfig, format: OutputFormat) -> Result<String> {
    let value = resolved.to_value();
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&value)?,
        OutputFormat::Yaml => serde_yaml::to_string(&value)?,
    })
}

/// Format groups, their members and variants as markdown.
pub fn format_registry_markdown(registry: &Registry) -> String {
    let mut md = String::new();

    let groups = registry.list_groups();
    md.push_str(&format!("# Groups ({})\n\n", groups.len()));
    for (group, members) in &groups {
        md.push_str(&format!("## {}\n", group));
        for member in members {
            md.push_str(&format!("- {}\n", member));
        }
        md.push('\n');
    }

    let variants = registry.list_variants();
    md.push_str(&format!("# Variants ({})\n\n", variants.len()));
    for variant in &variants {
        let target = registry
            .get_variant(variant)
            .map(|schema| schema.name().to_string())
            .unwrap_or_default();
        md.push_str(&format!("- `{}` ({})\n", variant, target));
    }

    md
}

/// Format a schema type's effective fields as markdown.
pub fn format_schema_markdown(schema: &SchemaType) -> String {
    let mut md = String::new();

    md.push_str(&format!("## {}\n", schema.name()));
    if let Some(parent) = schema.parent() {
        md.push_str(&format!("- **extends**: {}\n", parent.name()));
    }
    if let Some(origin) = schema.origin() {
        md.push_str(&format!("- **defined in**: `{}`\n", origin.display()));
    }
    if let Some(desc) = schema.description() {
        md.push_str(&format!("\n{}\n", desc));
    }

    md.push_str("\n### Fields\n");
    for field in schema.fields() {
        let default = if let Some(default_type) = &field.default_type {
            format!(" = {}", default_type.name())
        } else if field.ty.config_schema().is_some() && field.default.as_object().is_some_and(|m| m.is_empty()) {
            String::new()
        } else {
            format!(" = `{}`", field.default)
        };
        let desc = field
            .description
            .as_ref()
            .map(|d| format!(" - {}", d))
            .unwrap_or_default();
        md.push_str(&format!("- **{}**: {}{}{}\n", field.name, field.ty, default, desc));
    }

    md
}
