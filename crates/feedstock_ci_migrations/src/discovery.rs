//! Find the migrations that apply to a feedstock.
//!
//! A feedstock keeps copies of its active migrations in
//! `.ci_support/migrations`. The shared pinning ships the current version of
//! every active migration; when it is available it decides which local copies
//! are still current.

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::{
    document::{MigrationHeader, MigrationTimestamp},
    error::MigrationError,
};

/// The directory of the local migrations, relative to the feedstock.
pub const LOCAL_MIGRATIONS_DIR: &str = ".ci_support/migrations";

/// A migration file and the fields that decide whether it is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Path of the file
    pub path: PathBuf,
    /// The timestamp, `None` if the file has none
    pub timestamp: Option<MigrationTimestamp>,
    /// The migration number (`"1"` if not given)
    pub migration_number: String,
    /// Whether the local copy takes precedence
    pub use_local: bool,
}

impl MigrationFile {
    /// Read the header of a migration file.
    pub fn from_path(path: &Path) -> Result<Self, MigrationError> {
        let header = MigrationHeader::from_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            migration_number: header.migration_number().to_string(),
            use_local: header.use_local(),
            timestamp: header.migrator_ts,
        })
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// All `*.yaml` migrations in `dir`, sorted by path.
///
/// A directory that does not exist holds no migrations.
pub fn migrations_in_dir(dir: &Path) -> Result<Vec<MigrationFile>, MigrationError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths = fs_err::read_dir(dir)
        .map_err(|e| MigrationError::IoError(dir.to_path_buf(), e))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "yaml"))
        .collect::<Vec<_>>();
    paths.sort();

    paths.iter().map(|path| MigrationFile::from_path(path)).collect()
}

/// Delete an expired migration; a file that is already gone is fine.
fn remove_migration(path: &Path) -> Result<(), MigrationError> {
    match fs_err::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MigrationError::IoError(path.to_path_buf(), e)),
    }
}

/// Decide which migration files apply to the feedstock at `feedstock_dir`.
///
/// Without a shared migrations directory every local migration is used.
/// Otherwise, for each local migration:
///
/// - `use_local`, or no timestamp: the local file is used
/// - same timestamp and migration number in the shared directory: the shared
///   file is used
/// - same timestamp but a different migration number: the local file is used
/// - timestamp unknown to the shared directory: the migration is over, and the
///   local file is deleted
pub fn select_migrations(
    feedstock_dir: &Path,
    shared_dir: Option<&Path>,
) -> Result<Vec<PathBuf>, MigrationError> {
    let local = migrations_in_dir(&feedstock_dir.join(LOCAL_MIGRATIONS_DIR))?;

    let Some(shared_dir) = shared_dir.filter(|dir| dir.exists()) else {
        return Ok(local.into_iter().map(|migration| migration.path).collect());
    };

    let shared = migrations_in_dir(shared_dir)?
        .into_iter()
        .filter_map(|migration| Some((migration.timestamp.clone()?, migration)))
        .collect::<HashMap<_, _>>();

    let mut selected = Vec::new();
    for migration in local {
        let timestamp = match &migration.timestamp {
            Some(ts) if !migration.use_local => ts,
            _ => {
                if migration.timestamp.is_none() {
                    tracing::warn!(
                        "{} has no migrator_ts, it is always applied",
                        migration.file_name()
                    );
                }
                selected.push(migration.path);
                continue;
            }
        };

        match shared.get(timestamp) {
            Some(upstream) if upstream.migration_number == migration.migration_number => {
                tracing::info!(
                    "{} from feedstock is ignored and upstream version is used",
                    migration.file_name()
                );
                selected.push(upstream.path.clone());
            }
            Some(_) => selected.push(migration.path),
            None => {
                tracing::info!("{} is closed now. Removing", migration.file_name());
                remove_migration(&migration.path)?;
            }
        }
    }

    Ok(selected)
}
