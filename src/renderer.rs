//! A renderer that reads the outputs of a recipe from a file.
//!
//! The file maps target platforms (`linux-64`, ...) to the outputs the recipe
//! has there. The `default` entry is used for platforms without an entry of
//! their own:
//!
//! ```yaml
//! default:
//!   - name: libfoo
//!     used_vars: [c_compiler, python]
//!     top_level_vars: [c_compiler]
//! win-64:
//!   - name: libfoo
//!     used_vars: [python]
//!     skip: true
//! ```
//!
//! Outputs that list no `candidate_variants` get them from the variant spec:
//! every distinct combination of the variables they use, with zip partners
//! kept aligned.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use feedstock_ci_matrix::{MatrixContext, RenderedOutput, Renderer, expand};
use feedstock_ci_types::{Assignment, NormalizedKey, Variable, VariantSpec};
use indexmap::IndexSet;
use miette::Diagnostic;
use thiserror::Error;

/// The key of the outputs used for platforms without their own entry.
pub const DEFAULT_OUTPUTS_KEY: &str = "default";

#[derive(Debug, Error, Diagnostic)]
pub enum RendererError {
    #[error("Could not read rendered outputs ({0})")]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("Could not parse rendered outputs {}", path.display())]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Outputs of a recipe, read from a file, per target platform.
#[derive(Debug, Clone, Default)]
pub struct FileRenderer {
    outputs: BTreeMap<String, Vec<RenderedOutput>>,
}

impl FileRenderer {
    /// Use `outputs` for the given platforms.
    pub fn new(outputs: BTreeMap<String, Vec<RenderedOutput>>) -> Self {
        Self { outputs }
    }

    /// Read the outputs from `path`.
    pub fn from_file(path: &Path) -> Result<Self, RendererError> {
        let content = fs_err::read_to_string(path)
            .map_err(|e| RendererError::IoError(path.to_path_buf(), e))?;
        let outputs = serde_yaml::from_str::<Option<_>>(&content)
            .map_err(|source| RendererError::ParseError {
                path: path.to_path_buf(),
                source,
            })?
            .unwrap_or_default();
        Ok(Self::new(outputs))
    }

    fn outputs_for(&self, context: &MatrixContext) -> Option<&Vec<RenderedOutput>> {
        self.outputs
            .get(&context.target_platform.to_string())
            .or_else(|| self.outputs.get(DEFAULT_OUTPUTS_KEY))
    }
}

/// The variables an output depends on: its used variables, and the zip
/// partners of those in the spec.
fn resolved_used_vars(output: &RenderedOutput, spec: &VariantSpec) -> IndexSet<NormalizedKey> {
    let mut used = IndexSet::new();
    for key in &output.used_vars {
        if let Some(group) = spec.zip_group_of(key) {
            used.extend(group.iter().filter(|k| spec.contains_key(k)).cloned());
        }
        used.insert(key.clone());
    }
    used
}

fn render_output(
    output: &RenderedOutput,
    spec: &VariantSpec,
    context: &MatrixContext,
) -> Result<RenderedOutput, Box<dyn std::error::Error + Send + Sync>> {
    let mut output = output.clone();
    let used = resolved_used_vars(&output, spec);
    let target_platform = NormalizedKey::from("target_platform");

    if output.candidate_variants.is_empty() {
        let variants = expand(spec)?
            .into_iter()
            .map(|row| {
                let mut row: Assignment = row
                    .into_iter()
                    .filter(|(key, _)| used.contains(key))
                    .collect();
                if used.contains(&target_platform) && !row.contains_key(&target_platform) {
                    row.insert(
                        target_platform.clone(),
                        Variable::from(context.target_platform.to_string()),
                    );
                }
                row
            })
            .collect::<IndexSet<_>>();
        output.candidate_variants = variants.into_iter().collect();
    }

    if output.chosen_variant.is_empty()
        && let Some(first) = output.candidate_variants.first()
    {
        output.chosen_variant = first.clone();
    }

    output.used_vars.extend(used);
    Ok(output)
}

impl Renderer for FileRenderer {
    fn render(
        &self,
        spec: &VariantSpec,
        context: &MatrixContext,
    ) -> Result<Vec<RenderedOutput>, Box<dyn std::error::Error + Send + Sync>> {
        let Some(outputs) = self.outputs_for(context) else {
            tracing::warn!(
                "No outputs are known for {}, the platform has nothing to build",
                context.target_platform
            );
            return Ok(Vec::new());
        };

        outputs
            .iter()
            .map(|output| render_output(output, spec, context))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rattler_conda_types::Platform;

    fn spec() -> VariantSpec {
        VariantSpec::from_yaml_str(
            "python: [\"3.9\", \"3.10\"]\nnumpy: [\"1.21\", \"1.23\"]\nlibfoo: [\"1\"]\nzip_keys: [[python, numpy]]\n",
        )
        .unwrap()
    }

    fn output(used_vars: &[&str]) -> RenderedOutput {
        RenderedOutput {
            name: Some("pkg".to_string()),
            used_vars: used_vars.iter().map(|&v| NormalizedKey::from(v)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_variants_come_from_the_spec() {
        let renderer = FileRenderer::new(BTreeMap::from([(
            DEFAULT_OUTPUTS_KEY.to_string(),
            vec![output(&["python", "target_platform"])],
        )]));
        let context = MatrixContext::new(Platform::Linux64);
        let outputs = renderer.render(&spec(), &context).unwrap();

        assert_eq!(outputs.len(), 1);
        let rendered = &outputs[0];
        // numpy is zipped with python
        assert!(rendered.used_vars.contains(&NormalizedKey::from("numpy")));
        assert!(!rendered.used_vars.contains(&NormalizedKey::from("libfoo")));
        assert_eq!(rendered.candidate_variants.len(), 2);
        for variant in &rendered.candidate_variants {
            assert_eq!(variant.len(), 3);
            assert_eq!(
                variant.get(&NormalizedKey::from("target_platform")),
                Some(&Variable::from("linux-64"))
            );
        }
        assert_eq!(rendered.chosen_variant, rendered.candidate_variants[0]);
    }

    #[test]
    fn test_platform_entries_win_over_default() {
        let mut skipped = output(&["python"]);
        skipped.skip = true;
        let renderer = FileRenderer::new(BTreeMap::from([
            (DEFAULT_OUTPUTS_KEY.to_string(), vec![output(&["python"])]),
            ("win-64".to_string(), vec![skipped]),
        ]));

        let win = renderer
            .render(&spec(), &MatrixContext::new(Platform::Win64))
            .unwrap();
        assert!(win[0].skip);
        let linux = renderer
            .render(&spec(), &MatrixContext::new(Platform::Linux64))
            .unwrap();
        assert!(!linux[0].skip);
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_unknown_platform_has_no_outputs() {
        let renderer = FileRenderer::default();
        let outputs = renderer
            .render(&spec(), &MatrixContext::new(Platform::Osx64))
            .unwrap();
        assert!(outputs.is_empty());
        assert!(logs_contain("No outputs are known for osx-64"));
    }

    #[test]
    fn test_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("outputs.yaml");
        fs_err::write(
            &path,
            "linux-64:\n  - name: foo\n    used_vars: [python]\n    is_noarch: true\n",
        )
        .unwrap();

        let renderer = FileRenderer::from_file(&path).unwrap();
        let outputs = renderer
            .render(&spec(), &MatrixContext::new(Platform::Linux64))
            .unwrap();
        assert!(outputs[0].is_noarch);
        assert_eq!(outputs[0].candidate_variants.len(), 2);
    }
}
