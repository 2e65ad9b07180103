//! Error types for nbsync-engine.

use std::path::PathBuf;

use thiserror::Error;

use nbsync_convert::ConvertError;
use nbsync_core::ConfigError;

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid configuration handed to the engine.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The converter rejected the source document.
    #[error("conversion failed: {0}")]
    Convert(#[from] ConvertError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configured tree root exists but is not a directory.
    #[error("{path} exists but is not a directory")]
    NotADirectory { path: PathBuf },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
