//! Error types for migrations

use std::path::PathBuf;
use thiserror::Error;

#[cfg(feature = "miette")]
use miette::Diagnostic;

/// Errors that can occur while selecting or applying migrations
#[derive(Debug, Error)]
#[cfg_attr(feature = "miette", derive(Diagnostic))]
pub enum MigrationError {
    /// Failed to read or delete a migration file
    #[error("Could not access migration file ({0}): {1}")]
    IoError(PathBuf, #[source] std::io::Error),

    /// The migration file is not valid YAML or has an unexpected shape
    #[error("Could not parse migration {}: {source}", path.display())]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The migration asks for an operation the algebra does not know
    #[error("Unknown migration operation '{0}'")]
    #[cfg_attr(
        feature = "miette",
        diagnostic(help("supported operations are registered on the VariantAlgebra"))
    )]
    UnknownOperation(String),

    /// An operation that needs a primary key was used without one
    #[error("Migration operation '{0}' requires a primary_key")]
    MissingPrimaryKey(String),

    /// The primary key of a `key_add` migration is not part of the spec
    #[error("The primary key '{0}' of the migration is not in the variant spec")]
    PrimaryKeyNotInSpec(String),
}
