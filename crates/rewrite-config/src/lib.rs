//! Configuration for the `rewrite` tool.
//!
//! Parses `rewrite.toml` with serde and discovers it in the current
//! directory or its parents. [`CliSettings`] passed to [`Config::load`]
//! override values from the file.
//!
//! ```toml
//! [engine]
//! strategy = "splice"
//! policy = "all-at-once"
//! max_depth = 64
//!
//! [files]
//! extensions = ["html"]
//!
//! [[rules]]
//! name = "drop-dev"
//! tag = "drop"
//! attributes = { "data-env" = "dev" }
//! remove = true
//!
//! [[rules]]
//! tag = "item"
//! phase = "post"
//! template = "<li data-index=\"{index}\">{inner}</li>"
//! ```
//!
//! ## Environment Variable Expansion
//!
//! Rule templates support `${VAR}` (error if unset) and `${VAR:-default}`,
//! expanded once at load time. A bare `$name` naming an unset variable is
//! kept as written.

mod expand;

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rewrite_engine::{DEFAULT_MAX_DEPTH, MatchPolicy, Phase, Strategy};
use serde::{Deserialize, Deserializer};

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "rewrite.toml";

/// Upper bound accepted for `engine.max_depth`.
const MAX_DEPTH_LIMIT: usize = 1024;

/// CLI settings that override configuration file values.
///
/// Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override output assembly strategy.
    pub strategy: Option<Strategy>,
    /// Override match policy.
    pub policy: Option<MatchPolicy>,
    /// Override maximum nesting depth.
    pub max_depth: Option<usize>,
}

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Engine settings.
    pub engine: EngineConfig,
    /// Which files the tool rewrites.
    pub files: FilesConfig,
    /// Declarative rules in evaluation order.
    pub rules: Vec<RuleConfig>,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Engine configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// How the output is assembled.
    #[serde(deserialize_with = "from_str")]
    pub strategy: Strategy,
    /// How matched elements are selected.
    #[serde(deserialize_with = "from_str")]
    pub policy: MatchPolicy,
    /// Maximum nesting depth of recursive rewrites.
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            policy: MatchPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// File selection configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilesConfig {
    /// Extensions (without the leading dot) of files to rewrite.
    pub extensions: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["html".to_owned()],
        }
    }
}

impl FilesConfig {
    /// Whether `path` has one of the configured extensions.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }
}

/// A declarative rule.
///
/// Matches elements by tag, optional namespace and attribute values, and
/// either removes them or replaces them with a rendered template.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Name used in logs and errors; defaults to the tag.
    #[serde(default)]
    pub name: Option<String>,
    /// Phase the rule runs in.
    #[serde(default, deserialize_with = "from_str")]
    pub phase: Phase,
    /// Element name to match. Compared against the local name when
    /// `namespace` is set, otherwise against the qualified name.
    pub tag: String,
    /// Namespace URI the element must be in.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Attributes the element must carry with exactly these values.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Remove matched elements.
    #[serde(default)]
    pub remove: bool,
    /// Replacement template.
    ///
    /// Placeholders: `{inner}`, `{index}`, `{tag}`, `{start}`, `{end}`,
    /// `{attr:NAME}`.
    #[serde(default)]
    pub template: Option<String>,
}

impl RuleConfig {
    /// Name of the rule, falling back to its tag.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.tag)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`rules[0].template`").
        field: String,
        /// Error message (e.g., "${`CDN_HOST`} not set").
        message: String,
    },
}

/// Deserialize a value through its `FromStr` implementation.
fn from_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let value = String::deserialize(deserializer)?;
    value.parse().map_err(serde::de::Error::custom)
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise,
    /// searches for `rewrite.toml` in the current directory and parents,
    /// falling back to the defaults (no rules) when none is found.
    ///
    /// CLI settings are applied after loading and before validation.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing or
    /// expansion fails, or the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = std::env::current_dir()
            .ok()
            .and_then(|cwd| Self::discover_from(&cwd))
        {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text and expand templates.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or expansion fails. Does not validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env_vars()?;
        Ok(config)
    }

    /// Rules of a phase, in file order.
    pub fn rules_for(&self, phase: Phase) -> impl Iterator<Item = &RuleConfig> {
        self.rules.iter().filter(move |rule| rule.phase == phase)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(strategy) = settings.strategy {
            self.engine.strategy = strategy;
        }
        if let Some(policy) = settings.policy {
            self.engine.policy = policy;
        }
        if let Some(max_depth) = settings.max_depth {
            self.engine.max_depth = max_depth;
        }
    }

    /// Search for the config file in `start` and its parents.
    fn discover_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_engine()?;
        self.validate_files()?;
        for (i, rule) in self.rules.iter().enumerate() {
            validate_rule(i, rule)?;
        }
        Ok(())
    }

    fn validate_engine(&self) -> Result<(), ConfigError> {
        let depth = self.engine.max_depth;
        if depth == 0 || depth > MAX_DEPTH_LIMIT {
            return Err(ConfigError::Validation(format!(
                "engine.max_depth must be between 1 and {MAX_DEPTH_LIMIT}, got {depth}"
            )));
        }
        Ok(())
    }

    fn validate_files(&self) -> Result<(), ConfigError> {
        if self.files.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "files.extensions cannot be empty".to_owned(),
            ));
        }
        if let Some(ext) = self
            .files
            .extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(ConfigError::Validation(format!(
                "files.extensions entries must be non-empty and without a leading dot, got {ext:?}"
            )));
        }
        Ok(())
    }

    /// Expand environment variable references in rule templates.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        for (i, rule) in self.rules.iter_mut().enumerate() {
            if let Some(ref template) = rule.template {
                rule.template = Some(expand::expand_env(
                    template,
                    &format!("rules[{i}].template"),
                )?);
            }
        }
        Ok(())
    }
}

fn validate_rule(i: usize, rule: &RuleConfig) -> Result<(), ConfigError> {
    let field = format!("rules[{i}]");
    if rule.tag.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{field}.tag cannot be empty"
        )));
    }
    match (rule.remove, &rule.template) {
        (true, Some(_)) => Err(ConfigError::Validation(format!(
            "{field} ({}) sets both remove and template",
            rule.display_name()
        ))),
        (false, None) => Err(ConfigError::Validation(format!(
            "{field} ({}) needs either remove = true or a template",
            rule.display_name()
        ))),
        _ => Ok(()),
    }
}
