//! Turn the rendered outputs of one platform into its list of CI configs.

use feedstock_ci_types::{NormalizedKey, VariantSpec};
use std::collections::BTreeSet;

use crate::{
    aggregate::VariantUniverse,
    config::{Config, ConfigBody},
    context::MatrixContext,
    dedup::deduplicate,
    error::MatrixError,
    finalize::finalize_config,
    naming::config_names,
    partition::break_up_top_level_values,
    render::{RenderedOutput, Renderer},
    trim::used_variant_spec,
};

/// The collapsed, partitioned matrix of one platform before naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsedMatrix {
    /// One body per CI job
    pub bodies: Vec<ConfigBody>,
    /// The variables that were split into separate jobs
    pub top_level_loop_vars: BTreeSet<NormalizedKey>,
}

/// The result of expanding one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformMatrix {
    /// No output builds on this platform; nothing should be emitted.
    Disabled,
    /// The configs of the platform, sorted by name.
    Enabled(Vec<Config>),
}

impl PlatformMatrix {
    /// Returns true if the platform produces at least one config.
    pub fn is_enabled(&self) -> bool {
        matches!(self, PlatformMatrix::Enabled(_))
    }

    /// The configs, empty for a disabled platform.
    pub fn configs(&self) -> &[Config] {
        match self {
            PlatformMatrix::Disabled => &[],
            PlatformMatrix::Enabled(configs) => configs,
        }
    }
}

/// Collapse the variants of all outputs into the bodies of the CI jobs.
///
/// `input` is the variant spec the outputs were rendered with.
pub fn collapse_outputs(
    outputs: &[RenderedOutput],
    input: &VariantSpec,
    context: &MatrixContext,
) -> Result<CollapsedMatrix, MatrixError> {
    let universe = VariantUniverse::collect(outputs, input);
    let used = used_variant_spec(&universe, input, context);
    let deduplicated = deduplicate(used)?;
    let bodies = break_up_top_level_values(&universe.top_level_loop_vars, deduplicated);

    Ok(CollapsedMatrix {
        bodies,
        top_level_loop_vars: universe.top_level_loop_vars,
    })
}

/// Name and finalize every body, sorted by config name.
pub fn resolve_configs(collapsed: CollapsedMatrix, context: &MatrixContext) -> Vec<Config> {
    let prefix = context.config_prefix();
    let (platform, arch) = context.platform_and_arch();
    let build_platform = context.build_platform.to_string().replace('_', "-");
    let target_platform = NormalizedKey::from("target_platform");

    let mut configs = collapsed
        .bodies
        .into_iter()
        .map(|mut body| {
            let (config_name, short_config_name) =
                config_names(&prefix, &body, &collapsed.top_level_loop_vars);
            finalize_config(&mut body, context);

            let platform = body
                .get(&target_platform)
                .and_then(|value| value.first())
                .map(ToString::to_string)
                .unwrap_or_else(|| format!("{platform}-{arch}"));

            Config {
                config_name,
                short_config_name,
                platform,
                build_platform: build_platform.clone(),
                upload: context.upload,
                body,
            }
        })
        .collect::<Vec<_>>();

    configs.sort_by(|a, b| a.config_name.cmp(&b.config_name));
    configs
}

/// Render the recipe for one platform and build its CI configs.
///
/// Skipped outputs are ignored and noarch outputs are only considered when
/// the context keeps them. If nothing is left, the platform is
/// [`PlatformMatrix::Disabled`].
pub fn build_platform_matrix(
    renderer: &dyn Renderer,
    spec: &VariantSpec,
    context: &MatrixContext,
) -> Result<PlatformMatrix, MatrixError> {
    let outputs = renderer
        .render(spec, context)
        .map_err(|source| MatrixError::RenderFailed {
            platform: context.target_platform.to_string(),
            source,
        })?;

    let outputs = outputs
        .into_iter()
        .filter(|output| !output.skip)
        .filter(|output| context.keep_noarch || !output.is_noarch)
        .collect::<Vec<_>>();

    if outputs.is_empty() {
        tracing::info!(
            "No outputs build for {}, skipping the platform",
            context.target_platform
        );
        return Ok(PlatformMatrix::Disabled);
    }

    let collapsed = collapse_outputs(&outputs, spec, context)?;
    let configs = resolve_configs(collapsed, context);
    tracing::debug!(
        "{} configs for {}",
        configs.len(),
        context.target_platform
    );

    Ok(PlatformMatrix::Enabled(configs))
}
