//! hierconf CLI
//!
//! Resolves hierarchical configuration from definition directories and
//! command-line override tokens.

use anyhow::{Context, Result};
use clap::Parser;
use hierconf::cli::inspect::{run_list, run_show};
use hierconf::cli::resolve::run_resolve;
use hierconf::cli::{Cli, Command};
use hierconf::settings::SettingsLoader;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(log_filter(cli.verbose))
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(log_filter(cli.verbose))
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)
                .with_context(|| format!("Failed to open log file {}", filename))?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(log_filter(cli.verbose))
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    let dirs = definition_dirs(&cli.dirs)?;
    debug!(dirs = ?dirs, "Definition directories");

    let output = match &cli.command {
        Command::Resolve(args) => run_resolve(&dirs, args)?,
        Command::List => run_list(&dirs),
        Command::Show(args) => run_show(&dirs, args)?,
    };
    print!("{}", output);
    if !output.ends_with('\n') {
        println!();
    }

    Ok(())
}

/// `-v` forces debug output; otherwise `RUST_LOG` applies, defaulting to info.
fn log_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Explicit `--dir` arguments win; otherwise project settings decide.
fn definition_dirs(explicit: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if !explicit.is_empty() {
        return Ok(explicit.to_vec());
    }
    let loader = SettingsLoader::load()?;
    for (tier, source) in loader.sources() {
        debug!(tier = %tier, source = %source.display(), "Applied settings tier");
    }
    let base = loader.cwd().to_path_buf();
    Ok(loader.resolve_dirs(&base))
}
