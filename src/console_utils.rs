//! Logging setup for the `feedstock-ci` binary.

use std::{fmt::Write as _, str::FromStr};

use clap_verbosity_flag::log::LevelFilter;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::{
    EnvFilter,
    filter::Directive,
    fmt::{
        FmtContext, FormatEvent, FormatFields,
        format::{self, Format},
    },
    registry::LookupSpan,
};

/// Prints the bare message for informational events of this workspace and
/// the default format for everything else.
pub struct TracingFormatter;

impl<S, N> FormatEvent<S, N> for TracingFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();

        if *metadata.level() == tracing_core::metadata::Level::INFO
            && metadata.target().starts_with("feedstock_ci")
        {
            ctx.format_fields(writer.by_ref(), event)?;
            writeln!(writer)
        } else {
            Format::default().format_event(ctx, writer, event)
        }
    }
}

/// The filter for the given verbosity. The library crates share the
/// `feedstock_ci` prefix, so one directive covers all of them.
pub fn get_default_env_filter(verbose: LevelFilter) -> EnvFilter {
    let level = match verbose {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    };

    let mut result = EnvFilter::new(format!("feedstock_ci={level}"));
    if let Ok(directive) = Directive::from_str("rattler_conda_types=warn") {
        result = result.add_directive(directive);
    }
    result
}
