//! CLI error types.

use std::path::PathBuf;

use rewrite_config::ConfigError;
use rewrite_engine::RewriteError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Rewrite {
        path: PathBuf,
        #[source]
        source: RewriteError,
    },

    #[error("{failed} of {total} files failed")]
    Failed { failed: usize, total: usize },

    #[error("{0}")]
    Validation(String),
}
