//! Error types for nbsync-convert.

use thiserror::Error;

/// All errors that can arise from document conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The structured document is not valid notebook JSON.
    #[error("malformed notebook: {0}")]
    Json(#[from] serde_json::Error),

    /// The fence-matching expression failed to compile.
    #[error("converter pattern error: {0}")]
    Pattern(#[from] regex::Error),
}
