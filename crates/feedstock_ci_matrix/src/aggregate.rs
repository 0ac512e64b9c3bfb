//! Collapse the variants of all outputs of a recipe into one universe.
//!
//! A recipe can have many outputs, each with its own used variables and
//! variants. CI jobs are not split by output, so everything is unified here
//! before the matrix is trimmed and partitioned.

use feedstock_ci_types::{Assignment, NormalizedKey, VariantSpec};
use indexmap::IndexSet;
use std::collections::BTreeSet;

use crate::render::RenderedOutput;

/// Selecting `mpi` implies a correlation with the concrete MPI
/// implementations that no output references directly.
const MPI_KEY: &str = "mpi";
const MPI_IMPLEMENTATIONS: [&str; 2] = ["mpich", "openmpi"];

/// The union of everything the outputs of a recipe use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantUniverse {
    /// Variables used by at least one output
    pub used_vars: BTreeSet<NormalizedKey>,
    /// Every candidate and chosen variant, structurally deduplicated
    pub variants: IndexSet<Assignment>,
    /// True only if every output is platform independent
    pub is_noarch: bool,
    /// Variables used by the top-level recipe
    pub top_level_vars: BTreeSet<NormalizedKey>,
    /// Top-level variables that take more than one value; these become
    /// separate CI jobs
    pub top_level_loop_vars: BTreeSet<NormalizedKey>,
}

impl VariantUniverse {
    /// Aggregate the rendered outputs of one platform.
    ///
    /// `input` is the (migrated) variant spec the outputs were rendered with;
    /// it decides which variables are loop variables.
    pub fn collect(outputs: &[RenderedOutput], input: &VariantSpec) -> Self {
        let mut used_vars = BTreeSet::new();
        let mut variants = IndexSet::new();
        let mut is_noarch = true;

        for output in outputs {
            used_vars.extend(output.used_vars.iter().cloned());
            variants.extend(output.candidate_variants.iter().cloned());
            variants.insert(output.chosen_variant.clone());
            if !output.is_noarch {
                is_noarch = false;
            }
        }

        if used_vars.contains(&NormalizedKey::from(MPI_KEY)) {
            used_vars.extend(MPI_IMPLEMENTATIONS.iter().map(|&k| NormalizedKey::from(k)));
        }

        // top-level usage is a property of the recipe, any output reports it
        let top_level_vars = outputs
            .first()
            .map(|output| output.top_level_vars.clone())
            .unwrap_or_default();

        let loop_vars = input.loop_vars();
        let mut top_level_loop_vars: BTreeSet<NormalizedKey> = top_level_vars
            .intersection(&loop_vars)
            .cloned()
            .collect();

        let target_platform = NormalizedKey::from("target_platform");
        if used_vars.contains(&target_platform) {
            top_level_loop_vars.insert(target_platform);
        }

        tracing::debug!("top_level_loop_vars {:?}", top_level_loop_vars);

        VariantUniverse {
            used_vars,
            variants,
            is_noarch,
            top_level_vars,
            top_level_loop_vars,
        }
    }

    /// Top-level loop variables that no output uses. They never show up in
    /// the rendered variants and have to be taken from the input spec.
    pub fn preserved_top_level_loops(&self) -> BTreeSet<NormalizedKey> {
        self.top_level_loop_vars
            .difference(&self.used_vars)
            .cloned()
            .collect()
    }

    /// The rendered variants as a list of rows.
    pub fn rows(&self) -> Vec<Assignment> {
        self.variants.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedstock_ci_types::Variable;

    fn output(used: &[&str], python: &str, noarch: bool) -> RenderedOutput {
        let variant = Assignment::from([("python".into(), Variable::from(python))]);
        RenderedOutput {
            used_vars: used.iter().map(|&k| k.into()).collect(),
            top_level_vars: BTreeSet::from([NormalizedKey::from("python")]),
            candidate_variants: vec![variant.clone()],
            chosen_variant: variant,
            is_noarch: noarch,
            ..Default::default()
        }
    }

    fn input() -> VariantSpec {
        let mut spec = VariantSpec::new();
        spec.insert("python", vec!["3.9".into(), "3.10".into()]);
        spec.insert("zlib", vec!["1.2".into()]);
        spec
    }

    #[test]
    fn test_union_of_outputs() {
        let outputs = vec![
            output(&["python"], "3.9", false),
            output(&["python", "zlib"], "3.10", true),
            output(&["python"], "3.9", false),
        ];
        let universe = VariantUniverse::collect(&outputs, &input());
        assert_eq!(universe.used_vars.len(), 2);
        // identical rows of different outputs collapse
        assert_eq!(universe.variants.len(), 2);
        assert!(!universe.is_noarch);
        assert_eq!(
            universe.top_level_loop_vars,
            BTreeSet::from([NormalizedKey::from("python")])
        );
    }

    #[test]
    fn test_noarch_only_if_all_outputs_are() {
        let outputs = vec![output(&["python"], "3.9", true)];
        assert!(VariantUniverse::collect(&outputs, &input()).is_noarch);
    }

    #[test]
    fn test_mpi_pulls_in_implementations() {
        let outputs = vec![output(&["mpi"], "3.9", false)];
        let universe = VariantUniverse::collect(&outputs, &input());
        assert!(universe.used_vars.contains(&"mpich".into()));
        assert!(universe.used_vars.contains(&"openmpi".into()));
    }

    #[test]
    fn test_unused_top_level_loops_are_preserved() {
        let outputs = vec![output(&["zlib"], "3.9", false)];
        let universe = VariantUniverse::collect(&outputs, &input());
        assert_eq!(
            universe.preserved_top_level_loops(),
            BTreeSet::from([NormalizedKey::from("python")])
        );
    }
}
