//! `rewrite` CLI - rule-based markup rewriting.
//!
//! Provides commands for:
//! - `apply`: Rewrite files with the rules from `rewrite.toml`
//! - `check`: Validate the configuration and list its rules

mod commands;
mod error;
mod output;
mod rules;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ApplyArgs, CheckArgs};
use output::Output;

/// Rewrite matched elements of markup documents.
#[derive(Parser)]
#[command(name = "rewrite", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite files with the configured rules.
    Apply(ApplyArgs),
    /// Validate the configuration and list its rules.
    Check(CheckArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = matches!(&cli.command, Commands::Apply(args) if args.verbose);

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Apply(args) => args.execute(),
        Commands::Check(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
