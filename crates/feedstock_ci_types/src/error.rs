//! Error types for loading variant specifications

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading a variant specification
#[derive(Debug, Error)]
pub enum VariantSpecError {
    /// Failed to read file from disk
    #[error("Could not open file ({0}): {1}")]
    IoError(PathBuf, #[source] std::io::Error),

    /// The file is not a valid variant specification
    #[error("Could not parse variant spec file {}: {source}", path.display())]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The string is not a valid variant specification
    #[error("Invalid variant specification: {0}")]
    InvalidSpec(#[from] serde_yaml::Error),
}
