//! `rewrite apply` command implementation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use rayon::prelude::*;
use rewrite_config::{CliSettings, Config};
use rewrite_engine::{Engine, MatchPolicy, Phase, Strategy};

use crate::error::CliError;
use crate::output::Output;
use crate::rules::build_engine;

/// Phases to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum PhaseSelection {
    /// Only the pre phase.
    Pre,
    /// Only the post phase.
    Post,
    /// Pre, then post.
    #[default]
    All,
}

/// Arguments for the apply command.
#[derive(Args)]
pub(crate) struct ApplyArgs {
    /// Files to rewrite.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Path to configuration file (default: auto-discover rewrite.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Phases to run.
    #[arg(long, value_enum, default_value_t = PhaseSelection::All)]
    phase: PhaseSelection,

    /// Output assembly strategy: splice or reserialize (overrides config).
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Match policy: all-at-once or iterative-first (overrides config).
    #[arg(long)]
    policy: Option<MatchPolicy>,

    /// Maximum nesting depth of recursive rewrites (overrides config).
    #[arg(long)]
    max_depth: Option<usize>,

    /// Write results into this directory instead of stdout.
    #[arg(short, long, conflicts_with = "in_place")]
    out_dir: Option<PathBuf>,

    /// Overwrite the input files.
    #[arg(long)]
    in_place: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Where rewritten documents go.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Destination {
    Stdout,
    Directory(PathBuf),
    InPlace,
}

/// Result of processing one input file.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    /// Extension not configured.
    Skipped,
    /// Written to a file.
    Written { target: PathBuf, changed: bool },
    /// Kept for printing to stdout in input order.
    Rendered(String),
}

impl ApplyArgs {
    /// Execute the apply command.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or any file fails.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            strategy: self.strategy,
            policy: self.policy,
            max_depth: self.max_depth,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            tracing::info!("Using config {}", path.display());
        }

        let destination = self.destination();
        if let Destination::Directory(dir) = &destination {
            check_unique_names(&self.files)?;
            std::fs::create_dir_all(dir).map_err(|source| CliError::Write {
                path: dir.clone(),
                source,
            })?;
        }

        let engine = build_engine(&config);
        tracing::info!(
            "Rewriting {} file(s) with {} rule(s), strategy {}, policy {}",
            self.files.len(),
            config.rules.len(),
            engine.strategy(),
            engine.policy()
        );

        let results: Vec<Result<Outcome, CliError>> = self
            .files
            .par_iter()
            .map(|path| {
                if !config.files.accepts(path) {
                    return Ok(Outcome::Skipped);
                }
                process_file(&engine, self.phase, path, &destination)
            })
            .collect();

        let total = results.len();
        let mut failed = 0;
        for (path, result) in self.files.iter().zip(results) {
            match result {
                Ok(Outcome::Skipped) => output.warning(&format!(
                    "Skipping {}: extension not in files.extensions",
                    path.display()
                )),
                Ok(Outcome::Written { target, changed }) => {
                    let status = if changed { "rewritten" } else { "unchanged" };
                    output.success(&format!("{} -> {} ({status})", path.display(), target.display()));
                }
                Ok(Outcome::Rendered(content)) => output.document(&content)?,
                Err(err) => {
                    output.error(&err.to_string());
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(CliError::Failed { failed, total });
        }
        Ok(())
    }

    fn destination(&self) -> Destination {
        match (&self.out_dir, self.in_place) {
            (Some(dir), _) => Destination::Directory(dir.clone()),
            (None, true) => Destination::InPlace,
            (None, false) => Destination::Stdout,
        }
    }
}

/// Run the selected phases over a document.
fn run_phases(
    engine: &Engine,
    phase: PhaseSelection,
    input: &str,
) -> Result<String, rewrite_engine::RewriteError> {
    match phase {
        PhaseSelection::Pre => engine.transform_phase(input, Phase::Pre),
        PhaseSelection::Post => engine.transform_phase(input, Phase::Post),
        PhaseSelection::All => engine.transform(input),
    }
}

/// Read, rewrite and write a single file.
fn process_file(
    engine: &Engine,
    phase: PhaseSelection,
    path: &Path,
    destination: &Destination,
) -> Result<Outcome, CliError> {
    let input = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let rewritten = run_phases(engine, phase, &input).map_err(|source| CliError::Rewrite {
        path: path.to_path_buf(),
        source,
    })?;
    let changed = rewritten != input;
    tracing::debug!("{}: {} -> {} bytes", path.display(), input.len(), rewritten.len());

    let target = match destination {
        Destination::Stdout => return Ok(Outcome::Rendered(rewritten)),
        Destination::InPlace => path.to_path_buf(),
        Destination::Directory(dir) => {
            let name = path.file_name().ok_or_else(|| {
                CliError::Validation(format!("{} has no file name", path.display()))
            })?;
            dir.join(name)
        }
    };

    if changed || *destination != Destination::InPlace {
        std::fs::write(&target, &rewritten).map_err(|source| CliError::Write {
            path: target.clone(),
            source,
        })?;
    }

    Ok(Outcome::Written { target, changed })
}

/// Inputs written into one directory must not share a file name.
fn check_unique_names(files: &[PathBuf]) -> Result<(), CliError> {
    let mut seen = HashSet::new();
    for path in files {
        if let Some(name) = path.file_name()
            && !seen.insert(name)
        {
            return Err(CliError::Validation(format!(
                "more than one input is named {}; cannot write them to the same --out-dir",
                name.to_string_lossy()
            )));
        }
    }
    Ok(())
}
