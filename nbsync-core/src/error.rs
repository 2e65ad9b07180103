//! Error types for nbsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from configuration handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, with the path that was being read or written.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An ignore pattern is not valid glob syntax.
    #[error("invalid ignore pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// A value failed validation (negative duration, empty extension set, ...).
    #[error("invalid config value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
