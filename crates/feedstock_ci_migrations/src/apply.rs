use feedstock_ci_types::VariantSpec;
use std::{
    cmp::Ordering,
    path::{Path, PathBuf},
};

use crate::{algebra::VariantAlgebra, document::MigrationDocument, error::MigrationError};

/// A loaded migration and the file it came from.
#[derive(Debug, Clone)]
pub struct Migration {
    /// The file the migration was read from
    pub path: PathBuf,
    /// The parsed migration
    pub document: MigrationDocument,
}

impl Migration {
    /// Read a migration file.
    pub fn from_path(path: &Path) -> Result<Self, MigrationError> {
        Ok(Self {
            path: path.to_path_buf(),
            document: MigrationDocument::from_file(path)?,
        })
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Order by `(migrator_ts, file name)`; migrations without a timestamp go
/// last.
fn application_order(a: &Migration, b: &Migration) -> Ordering {
    let by_timestamp = match (&a.document.migrator_ts, &b.document.migrator_ts) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_timestamp
        .then_with(|| a.file_name().cmp(&b.file_name()))
        .then_with(|| a.path.cmp(&b.path))
}

/// Apply `migrations` to `spec`, oldest first.
pub fn apply_migrations(
    spec: VariantSpec,
    mut migrations: Vec<Migration>,
    algebra: &VariantAlgebra,
) -> Result<VariantSpec, MigrationError> {
    migrations.sort_by(application_order);

    if !migrations.is_empty() {
        tracing::info!(
            "Applying migrations: {}",
            migrations
                .iter()
                .map(|m| m.path.display().to_string())
                .collect::<Vec<_>>()
                .join(",")
        );
    }

    let mut spec = spec;
    for migration in &migrations {
        if migration.document.is_empty() {
            continue;
        }
        spec = algebra.variant_add(spec, &migration.document)?;
    }
    Ok(spec)
}

/// Read the migration files and apply them to `spec`.
pub fn migrate_combined_spec(
    spec: &VariantSpec,
    migration_paths: &[PathBuf],
    algebra: &VariantAlgebra,
) -> Result<VariantSpec, MigrationError> {
    let migrations = migration_paths
        .iter()
        .map(|path| Migration::from_path(path))
        .collect::<Result<Vec<_>, _>>()?;
    apply_migrations(spec.clone(), migrations, algebra)
}
