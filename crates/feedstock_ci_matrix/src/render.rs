//! The renderer seam: turning a recipe and a variant spec into per-output
//! metadata is done elsewhere, the engine only consumes its result.

use feedstock_ci_types::{Assignment, NormalizedKey, VariantSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::context::MatrixContext;

/// The metadata of one rendered recipe output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedOutput {
    /// The name of the output, for diagnostics only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Variables referenced by this output
    pub used_vars: BTreeSet<NormalizedKey>,

    /// Variables referenced by the top-level recipe rather than the output
    #[serde(default)]
    pub top_level_vars: BTreeSet<NormalizedKey>,

    /// All variants the renderer considered for this output
    #[serde(default)]
    pub candidate_variants: Vec<Assignment>,

    /// The variant the renderer settled on
    #[serde(default)]
    pub chosen_variant: Assignment,

    /// Whether the output is platform independent
    #[serde(default)]
    pub is_noarch: bool,

    /// Whether the recipe skips this output on the platform
    #[serde(default)]
    pub skip: bool,
}

/// Renders a recipe for a variant specification.
///
/// Implementations must be pure: the same spec and context yield the same
/// outputs. Any error is fatal for the platform being expanded.
pub trait Renderer {
    /// Render all outputs of the recipe.
    fn render(
        &self,
        spec: &VariantSpec,
        context: &MatrixContext,
    ) -> Result<Vec<RenderedOutput>, Box<dyn std::error::Error + Send + Sync>>;
}
