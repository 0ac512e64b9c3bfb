//! Command-line options.

use std::path::PathBuf;

use clap::{Parser, crate_version};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use rattler_conda_types::Platform;

/// Application subcommands.
#[derive(Parser)]
pub enum SubCommands {
    /// Regenerate the CI job configurations of a feedstock
    Generate(GenerateOpts),

    /// List the migrations of a feedstock
    Migrations(MigrationsOpts),
}

/// Compute the CI job matrix of a feedstock.
#[derive(Parser)]
#[clap(version = crate_version!())]
pub struct App {
    /// Subcommand.
    #[clap(subcommand)]
    pub subcommand: SubCommands,

    /// Enable verbose logging.
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

/// Options for the `generate` command.
#[derive(Parser, Debug, Clone)]
pub struct GenerateOpts {
    /// The feedstock root directory.
    #[arg(long, default_value = ".")]
    pub feedstock_dir: PathBuf,

    /// The feedstock configuration file. Defaults to `conda-forge.yml` in
    /// the feedstock root.
    #[arg(long)]
    pub forge_config: Option<PathBuf>,

    /// Variant configuration files, later files override earlier ones.
    /// Defaults to `conda_build_config.yaml` in the recipe directory.
    #[arg(short = 'm', long)]
    pub variant_config: Vec<PathBuf>,

    /// The outputs of the recipe per target platform.
    #[arg(short = 'r', long)]
    pub rendered_outputs: PathBuf,

    /// Only generate the configurations of these target platforms. Defaults
    /// to every platform of the feedstock configuration.
    #[arg(long = "target-platform")]
    pub target_platforms: Vec<Platform>,

    /// The migrations shipped with the global pinning. Local migrations that
    /// are not in this directory anymore are removed.
    #[arg(long, env = "FEEDSTOCK_CI_SHARED_MIGRATIONS")]
    pub shared_migrations: Option<PathBuf>,
}

/// Options for the `migrations` command.
#[derive(Parser, Debug, Clone)]
pub struct MigrationsOpts {
    /// The feedstock root directory.
    #[arg(long, default_value = ".")]
    pub feedstock_dir: PathBuf,
}
