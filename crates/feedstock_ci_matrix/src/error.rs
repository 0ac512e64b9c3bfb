//! Error types for the matrix engine

use thiserror::Error;

#[cfg(feature = "miette")]
use miette::Diagnostic;

/// Errors that can occur while expanding or collapsing a build matrix
#[derive(Debug, Error)]
#[cfg_attr(feature = "miette", derive(Diagnostic))]
pub enum MatrixError {
    /// Zip key elements have mismatched lengths
    #[error("Zip key elements do not all have same length: {0}")]
    InvalidZipKeyLength(String),

    /// A zip group with less than two keys was requested
    #[error("zip_keys must be a list of lists with at least two keys each")]
    InvalidZipKeyStructure,

    /// The renderer could not render the recipe for this platform
    #[error("Failed to render the recipe for {platform}")]
    #[cfg_attr(
        feature = "miette",
        diagnostic(help("rendering failures are fatal for the whole platform"))
    )]
    RenderFailed {
        platform: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The build platform of a target platform is not configured
    #[error("No build platform configured for {0}")]
    MissingBuildPlatform(String),
}
