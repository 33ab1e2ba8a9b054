//! Error types for freight.
//!
//! Every pipeline error is fatal and unwinds to the CLI entrypoint; only
//! image removal during the cleanup phase is downgraded to a warning.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for freight operations.
pub type Result<T> = std::result::Result<T, FreightError>;

/// Freight error types.
#[derive(Error, Debug)]
pub enum FreightError {
    /// Compose manifest was unreadable or not valid YAML
    #[error("Failed to parse compose file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// Bundle metadata missing or invalid
    #[error("Invalid bundle metadata: {0}")]
    Validation(String),

    /// Engine reported a build failure
    #[error("Build failed for image {image}: {reason}")]
    Build { image: String, reason: String },

    /// Engine reported a pull failure
    #[error("Pull failed for image {image}: {reason}")]
    Pull { image: String, reason: String },

    /// Image export to disk failed
    #[error("Save failed for image {image}: {reason}")]
    Save { image: String, reason: String },

    /// Image removal failed (cleanup phase, logged not fatal)
    #[error("Remove failed for image {image}: {reason}")]
    Remove { image: String, reason: String },

    /// Engine client or transport error outside a specific operation
    #[error("Container engine error: {0}")]
    Engine(String),

    /// Filesystem error (temp directory, archive writing)
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FreightError {
    /// Build an [`FreightError::Io`] from a path and source error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
