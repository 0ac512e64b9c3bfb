//! The library behind the `feedstock-ci` binary.
//!
//! `generate` reads the variant configuration of a feedstock, applies its
//! migrations, expands the job matrix of every target platform and writes
//! one config per CI job to `.ci_support`.

pub mod console_utils;
pub mod emit;
pub mod forge_config;
pub mod opt;
pub mod renderer;

use std::path::{Path, PathBuf};

use feedstock_ci_matrix::{PlatformMatrix, build_platform_matrix};
use feedstock_ci_migrations::{
    LOCAL_MIGRATIONS_DIR, MigrationFile, VariantAlgebra, migrate_combined_spec, migrations_in_dir,
    select_migrations,
};
use feedstock_ci_types::VariantSpec;
use miette::IntoDiagnostic;

use crate::{
    emit::write_configs,
    forge_config::ForgeConfig,
    opt::{GenerateOpts, MigrationsOpts},
    renderer::FileRenderer,
};

/// The variant configuration file of a recipe.
pub const CONDA_BUILD_CONFIG_FILE: &str = "conda_build_config.yaml";

/// The variant spec given on the command line, or the one of the recipe.
fn load_variant_spec(
    opts: &GenerateOpts,
    forge_config: &ForgeConfig,
) -> miette::Result<VariantSpec> {
    if !opts.variant_config.is_empty() {
        return VariantSpec::from_files(opts.variant_config.as_slice()).into_diagnostic();
    }

    let recipe_config = opts
        .feedstock_dir
        .join(&forge_config.recipe_dir)
        .join(CONDA_BUILD_CONFIG_FILE);
    if recipe_config.is_file() {
        VariantSpec::from_file(&recipe_config).into_diagnostic()
    } else {
        tracing::warn!(
            "No variant configuration given and {} does not exist",
            recipe_config.display()
        );
        Ok(VariantSpec::new())
    }
}

/// Regenerate the CI job configurations of a feedstock.
///
/// Either every platform succeeds and `.ci_support` is replaced, or nothing
/// is written. Returns the written files.
pub fn generate(opts: &GenerateOpts) -> miette::Result<Vec<PathBuf>> {
    let feedstock_dir = opts.feedstock_dir.as_path();
    let forge_config = ForgeConfig::load(feedstock_dir, opts.forge_config.as_deref())?;

    let spec = load_variant_spec(opts, &forge_config)?;
    let migrations = select_migrations(feedstock_dir, opts.shared_migrations.as_deref())?;
    let spec = migrate_combined_spec(&spec, &migrations, &VariantAlgebra::default())?;

    let renderer = FileRenderer::from_file(&opts.rendered_outputs)?;

    let platforms = if opts.target_platforms.is_empty() {
        forge_config.target_platforms()
    } else {
        opts.target_platforms.clone()
    };

    let mut configs = Vec::new();
    for platform in platforms {
        let context = forge_config.matrix_context(platform)?;
        match build_platform_matrix(&renderer, &spec, &context)? {
            PlatformMatrix::Disabled => {
                tracing::info!("{platform} is disabled, there is nothing to build");
            }
            PlatformMatrix::Enabled(platform_configs) => {
                tracing::info!("{platform}: {} jobs", platform_configs.len());
                configs.extend(platform_configs);
            }
        }
    }

    Ok(write_configs(feedstock_dir, &configs)?)
}

/// The migrations stored in the feedstock, oldest first.
pub fn local_migrations(feedstock_dir: &Path) -> miette::Result<Vec<MigrationFile>> {
    let mut migrations = migrations_in_dir(&feedstock_dir.join(LOCAL_MIGRATIONS_DIR))?;
    migrations.sort_by(|a, b| match (&a.timestamp, &b.timestamp) {
        (Some(a_ts), Some(b_ts)) => a_ts.cmp(b_ts),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    Ok(migrations)
}

/// Print the migrations stored in the feedstock.
pub fn list_migrations(opts: &MigrationsOpts) -> miette::Result<()> {
    let migrations = local_migrations(&opts.feedstock_dir)?;
    if migrations.is_empty() {
        tracing::info!("No migrations in {}", opts.feedstock_dir.display());
        return Ok(());
    }

    for migration in migrations {
        let timestamp = migration
            .timestamp
            .map(|ts| ts.to_string())
            .unwrap_or_else(|| "-".to_string());
        let name = migration
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!(
            "{name}: migrator_ts {timestamp}, migration_number {}{}",
            migration.migration_number,
            if migration.use_local { ", use_local" } else { "" }
        );
    }
    Ok(())
}
