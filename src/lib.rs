//! Hierarchical configuration resolution.
//!
//! Typed configurations are assembled from a directory tree of definition
//! files, with three override layers applied in priority order: type defaults
//! (optionally a named variant), group selections that swap whole subtrees,
//! and dotted-path field overrides from the command line.

pub mod app;
pub mod builder;
pub mod cli;
pub mod error;
pub mod format;
pub mod merge;
pub mod naming;
pub mod nested;
pub mod overrides;
pub mod registry;
pub mod schema;
pub mod settings;
