//! `rewrite check` command implementation.

use std::path::PathBuf;

use clap::Args;
use rewrite_config::{Config, RuleConfig};
use rewrite_engine::Phase;

use crate::error::CliError;
use crate::output::Output;
use crate::rules::build_engine;

/// Arguments for the check command.
#[derive(Args)]
pub(crate) struct CheckArgs {
    /// Path to configuration file (default: auto-discover rewrite.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl CheckArgs {
    /// Execute the check command.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or is invalid.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = Config::load(self.config.as_deref(), None)?;

        match &config.config_path {
            Some(path) => output.highlight(&format!("Config: {}", path.display())),
            None => output.warning("No rewrite.toml found, using defaults"),
        }

        let engine = build_engine(&config);
        output.info(&format!(
            "Engine: strategy {}, policy {}, max depth {}",
            engine.strategy(),
            engine.policy(),
            engine.max_depth()
        ));
        output.info(&format!("Files: {}", config.files.extensions.join(", ")));

        for phase in Phase::ALL {
            let rules: Vec<&RuleConfig> = config.rules_for(phase).collect();
            if rules.is_empty() {
                output.detail(&format!("[{phase}] no rules"));
                continue;
            }
            output.highlight(&format!("[{phase}] {} rule(s)", rules.len()));
            for rule in rules {
                output.info(&format!("  {}", describe(rule)));
            }
        }

        output.success("Configuration is valid");
        Ok(())
    }
}

/// One-line summary of a rule.
fn describe(rule: &RuleConfig) -> String {
    let mut selector = rule.tag.clone();
    if let Some(ns) = &rule.namespace {
        selector = format!("{{{ns}}}{selector}");
    }
    for (name, value) in &rule.attributes {
        selector.push_str(&format!("[{name}={value:?}]"));
    }
    let action = match &rule.template {
        Some(template) if !rule.remove => format!("-> {template}"),
        _ => "-> remove".to_owned(),
    };
    format!("{}: {selector} {action}", rule.display_name())
}
