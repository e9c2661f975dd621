//! CLI command definitions for hierconf
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod inspect;
pub mod resolve;

use clap::{Parser, Subcommand};
use inspect::ShowArgs;
use resolve::ResolveArgs;
use std::path::PathBuf;

/// Resolve hierarchical configuration from definition directories
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Definition directory (repeatable; later ones override earlier ones).
    /// Defaults to the directories named by project settings.
    #[arg(short, long = "dir", value_name = "DIR", global = true)]
    pub dirs: Vec<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a configuration from override tokens
    Resolve(ResolveArgs),

    /// List config groups, their members and variants
    List,

    /// Show the effective fields of a config type
    Show(ShowArgs),
}
