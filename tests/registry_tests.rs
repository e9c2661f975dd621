//! Integration tests for definition discovery and registry classification.
//!
//! Uses the fixture tree under `tests/fixtures/configs`:
//! - base.yaml: root types and their variants
//! - model/: group members, one per file
//! - optimizer/: a multi-definition file plus a file with broken syntax
//! - _private/: must never be loaded

use hierconf::error::ConfigError;
use hierconf::registry::Registry;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/configs")
}

fn fixture_registry() -> Registry {
    let mut registry = Registry::new();
    registry.discover(fixtures_dir());
    registry
}

#[test]
fn test_discover_groups() {
    let registry = fixture_registry();
    let groups = registry.list_groups();

    assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["model", "optimizer"]);
    assert_eq!(
        groups["model"],
        vec!["BaseModelConfig", "LargeModelConfig", "SmallModelConfig"]
    );
    // Both definitions of the multi-definition file are members.
    assert_eq!(groups["optimizer"], vec!["AdamConfig", "SGDConfig"]);
}

#[test]
fn test_discover_variants() {
    let registry = fixture_registry();
    assert_eq!(
        registry.list_variants(),
        vec!["adam-config", "child-config", "complex-variant", "quick-test", "sgd-config"]
    );

    let quick = registry.get_variant("quick-test").unwrap();
    assert_eq!(quick.name(), "QuickTest");
    assert!(quick.is_subtype_of(registry.get_type("TrainConfig").unwrap()));
}

#[test]
fn test_root_level_types_are_not_group_members() {
    let registry = fixture_registry();
    assert!(!registry.has_group("configs"));
    assert!(registry.get_type("BaseConfig").is_ok());
    assert!(registry.list_variants().iter().all(|v| v != "base-config"));
}

#[test]
fn test_private_and_broken_files_skipped() {
    let registry = fixture_registry();
    assert!(registry.get_type("HiddenConfig").is_err());
    assert!(registry.get_type("BrokenConfig").is_err());
    // The broken file does not affect its siblings.
    assert!(registry.get_group("optimizer", "SGDConfig").is_ok());
}

#[test]
fn test_group_member_inherits_across_files() {
    let registry = fixture_registry();
    let sgd = registry.get_group("optimizer", "SGDConfig").unwrap();
    let instance = sgd.default_instance().unwrap();
    assert_eq!(instance.value("lr"), Some(&serde_json::json!(0.01)));
    assert_eq!(instance.value("momentum"), Some(&serde_json::json!(0.9)));
    assert!(Arc::ptr_eq(
        sgd.parent().unwrap(),
        registry.get_type("OptimizerConfig").unwrap()
    ));
}

#[test]
fn test_lookup_failures_list_alternatives() {
    let registry = fixture_registry();

    let err = registry.get_group("model", "HugeModelConfig").unwrap_err();
    assert_eq!(
        err.to_string(),
        "config 'HugeModelConfig' not found in group 'model'. \
         Available: [BaseModelConfig, LargeModelConfig, SmallModelConfig]"
    );

    let err = registry.get_group("scheduler", "Cosine").unwrap_err();
    assert_eq!(
        err.to_string(),
        "config group 'scheduler' not found. Available: [model, optimizer]"
    );

    match registry.get_variant("slow-test").unwrap_err() {
        ConfigError::NotFound { available, .. } => assert!(available.contains(&"quick-test".to_string())),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_directory_is_noop() {
    let mut registry = Registry::new();
    assert_eq!(registry.discover("/nonexistent/hierconf/configs"), 0);
    assert!(registry.list_groups().is_empty());
    assert!(registry.list_variants().is_empty());
}

#[test]
fn test_later_discovery_overrides_and_links() {
    let temp = TempDir::new().unwrap();
    let model_dir = temp.path().join("model");
    fs::create_dir_all(&model_dir).unwrap();
    // Redefines a member and extends a type from the first directory.
    fs::write(
        model_dir.join("small.yaml"),
        "SmallModelConfig:\n  fields:\n    size: { type: int, default: 64 }\n",
    )
    .unwrap();
    fs::write(
        temp.path().join("variants.yaml"),
        "LongTrain:\n  extends: TrainConfig\n  fields:\n    epochs: 1000\n",
    )
    .unwrap();

    let mut registry = fixture_registry();
    let first = Arc::clone(registry.get_group("model", "SmallModelConfig").unwrap());
    assert_eq!(registry.discover(temp.path()), 2);

    let second = registry.get_group("model", "SmallModelConfig").unwrap();
    assert!(!Arc::ptr_eq(&first, second));
    assert!(second.field("layers").is_none());

    let long = registry.get_variant("LongTrain").unwrap();
    let instance = long.default_instance().unwrap();
    assert_eq!(instance.value("epochs"), Some(&serde_json::json!(1000)));
}

#[test]
fn test_discovery_is_repeatable() {
    let first = fixture_registry();
    let second = fixture_registry();
    assert_eq!(first.list_groups(), second.list_groups());
    assert_eq!(first.list_variants(), second.list_variants());
    assert_eq!(first.list_types(), second.list_types());
}

#[test]
fn test_three_types_in_one_file_are_three_members() {
    let temp = TempDir::new().unwrap();
    let group = temp.path().join("scheduler");
    fs::create_dir_all(&group).unwrap();
    fs::write(
        group.join("all.yaml"),
        r#"
CosineSchedule:
  fields:
    warmup: 100
StepSchedule:
  fields:
    step_size: 10
    gamma: 0.1
ConstantSchedule:
  fields:
    rate: 1.0
"#,
    )
    .unwrap();

    let mut registry = Registry::new();
    assert_eq!(registry.discover(temp.path()), 3);
    assert_eq!(
        registry.list_groups()["scheduler"],
        vec!["ConstantSchedule", "CosineSchedule", "StepSchedule"]
    );
    assert!(registry.list_variants().is_empty());
}

#[test]
fn test_one_broken_file_among_valid_ones() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.yaml"), "First:\n  fields:\n    x: 1\n").unwrap();
    fs::write(temp.path().join("b.yaml"), "Broken:\n  fields: {x: [1,\n").unwrap();
    fs::write(temp.path().join("c.yaml"), "Second:\n  extends: First\n").unwrap();

    let mut registry = Registry::new();
    assert_eq!(registry.discover(temp.path()), 2);
    assert_eq!(registry.list_types(), vec!["First", "Second"]);
    assert_eq!(registry.list_variants(), vec!["second"]);
}
