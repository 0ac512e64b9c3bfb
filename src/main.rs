//! This is the main entry point for the `feedstock-ci` binary.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*};

use feedstock_ci::{
    console_utils::{TracingFormatter, get_default_env_filter},
    generate, list_migrations,
    opt::{App, SubCommands},
};

fn main() -> miette::Result<()> {
    let args = App::parse();

    tracing_subscriber::registry()
        .with(get_default_env_filter(args.verbose.log_level_filter()))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .event_format(TracingFormatter),
        )
        .init();

    match args.subcommand {
        SubCommands::Generate(opts) => {
            let written = generate(&opts)?;
            tracing::info!("{} configs written", written.len());
            Ok(())
        }
        SubCommands::Migrations(opts) => list_migrations(&opts),
    }
}
