//! Select the variables that end up in the CI configs and drop everything
//! that would only cause noise (degenerate zip groups, unused pins).

use feedstock_ci_types::{NormalizedKey, VariantSpec};
use std::collections::{BTreeMap, BTreeSet};

use crate::{aggregate::VariantUniverse, combination::squish, context::MatrixContext};

/// Variables that are kept even when no output references them.
pub const ALWAYS_KEEP_KEYS: &[&str] = &[
    "zip_keys",
    "pin_run_as_build",
    "MACOSX_DEPLOYMENT_TARGET",
    "MACOSX_SDK_VERSION",
    "macos_min_version",
    "macos_machine",
    "channel_sources",
    "channel_targets",
    "docker_image",
    "build_number_decrement",
    // required by some of the aarch64 builds
    "cdt_arch",
    "cdt_name",
    "BUILD",
];

/// The runner labels of self-hosted jobs.
pub const SELF_HOSTED_LABELS_KEY: &str = "github_actions_labels";

/// The full allow-list for one platform.
pub fn always_keep_keys(is_noarch: bool, self_hosted: bool) -> BTreeSet<NormalizedKey> {
    let mut keys: BTreeSet<NormalizedKey> =
        ALWAYS_KEEP_KEYS.iter().map(|&k| NormalizedKey::from(k)).collect();
    if !is_noarch {
        keys.insert("target_platform".into());
    }
    if self_hosted {
        keys.insert(SELF_HOSTED_LABELS_KEY.into());
    }
    keys
}

/// Build the spec of all used variables.
///
/// Values come from the rendered variants where available and from the input
/// spec otherwise. Top-level loop variables that no output uses are copied
/// from the input spec as well. Both trims are applied to the result.
pub fn used_variant_spec(
    universe: &VariantUniverse,
    input: &VariantSpec,
    context: &MatrixContext,
) -> VariantSpec {
    let mut all_used_vars = universe.used_vars.clone();
    all_used_vars.extend(always_keep_keys(universe.is_noarch, context.self_hosted));
    all_used_vars.extend(universe.top_level_vars.iter().cloned());

    let rendered = squish(&universe.rows(), input.zip_groups());

    let mut variants: BTreeMap<_, _> = all_used_vars
        .iter()
        .filter_map(|key| Some((key.clone(), input.get(key)?.clone())))
        .collect();

    for (key, values) in rendered {
        if all_used_vars.contains(&key) {
            variants.insert(key, values);
        }
    }

    for key in universe.preserved_top_level_loops() {
        if let Some(values) = input.get(&key) {
            variants.insert(key, values.clone());
        }
    }

    let mut spec = VariantSpec {
        zip_keys: input.zip_keys.clone(),
        pin_run_as_build: input.pin_run_as_build.clone(),
        variants,
    };
    trim(&mut spec);
    spec
}

/// Apply both trims.
pub fn trim(spec: &mut VariantSpec) {
    trim_unused_zip_keys(spec);
    trim_unused_pin_run_as_build(spec);
}

/// Remove keys without values from the zip groups and drop groups that are
/// left with less than two members. `zip_keys` is removed entirely when no
/// group survives.
pub fn trim_unused_zip_keys(spec: &mut VariantSpec) {
    let Some(groups) = spec.zip_keys.take() else {
        return;
    };

    let used_groups = groups
        .into_iter()
        .map(|group| {
            group
                .into_iter()
                .filter(|key| spec.variants.contains_key(key))
                .collect::<Vec<_>>()
        })
        .filter(|group| group.len() > 1)
        .collect::<Vec<_>>();

    if !used_groups.is_empty() {
        spec.zip_keys = Some(used_groups);
    }
}

/// Drop pins of packages that are not used variables.
pub fn trim_unused_pin_run_as_build(spec: &mut VariantSpec) {
    let Some(mut pins) = spec.pin_run_as_build.take() else {
        return;
    };

    pins.retain_used(|package| spec.variants.contains_key(package));

    if !pins.is_empty() {
        spec.pin_run_as_build = Some(pins);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderedOutput;
    use feedstock_ci_types::{Assignment, Variable};
    use pretty_assertions::assert_eq;
    use rattler_conda_types::Platform;
    use rstest::rstest;

    fn spec(yaml: &str) -> VariantSpec {
        VariantSpec::from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn test_zip_group_reduced_to_one_member_is_dropped() {
        let mut spec = spec(
            r#"
python: ["3.9", "3.10"]
numpy: ["1.21", "1.23"]
zlib: ["1.2", "1.3"]
zip_keys:
  - [python, numpy]
  - [zlib, libpng]
"#,
        );
        trim_unused_zip_keys(&mut spec);
        assert_eq!(
            spec.zip_keys,
            Some(vec![vec!["python".into(), "numpy".into()]])
        );

        spec.remove(&"numpy".into());
        trim_unused_zip_keys(&mut spec);
        assert_eq!(spec.zip_keys, None);
    }

    #[test]
    fn test_unused_pins_are_dropped() {
        let mut spec = spec(
            r#"
python: ["3.9"]
libfoo_devel: ["1"]
pin_run_as_build:
  python:
    max_pin: x.x
  libfoo-devel:
    max_pin: x
  boost:
    max_pin: x.x.x
"#,
        );
        trim_unused_pin_run_as_build(&mut spec);
        let pins = spec.pin_run_as_build.unwrap();
        assert_eq!(
            pins.packages().collect::<Vec<_>>(),
            vec!["libfoo-devel", "python"]
        );

        let mut spec = VariantSpec::from_yaml_str("pin_run_as_build:\n  boost:\n    max_pin: x\n").unwrap();
        trim_unused_pin_run_as_build(&mut spec);
        assert_eq!(spec.pin_run_as_build, None);
    }

    #[rstest]
    #[case(false, false, true, false)]
    #[case(true, false, false, false)]
    #[case(false, true, true, true)]
    fn test_always_keep_keys(
        #[case] is_noarch: bool,
        #[case] self_hosted: bool,
        #[case] has_target_platform: bool,
        #[case] has_labels: bool,
    ) {
        let keys = always_keep_keys(is_noarch, self_hosted);
        assert!(keys.contains(&"docker_image".into()));
        assert_eq!(keys.contains(&"target_platform".into()), has_target_platform);
        assert_eq!(keys.contains(&SELF_HOSTED_LABELS_KEY.into()), has_labels);
    }

    #[test]
    fn test_used_variant_spec() {
        let input = spec(
            r#"
python: ["3.9", "3.10"]
numpy: ["1.21", "1.23"]
docker_image: ["quay.io/condaforge/linux-anvil-cos7-x86_64"]
target_platform: ["linux-64"]
unused: ["a", "b"]
zip_keys:
  - [python, numpy]
"#,
        );
        let rows: Vec<Assignment> = [("3.9", "1.21"), ("3.10", "1.23")]
            .into_iter()
            .map(|(p, n)| {
                Assignment::from([
                    ("python".into(), Variable::from(p)),
                    ("numpy".into(), Variable::from(n)),
                    ("unused".into(), Variable::from("a")),
                ])
            })
            .collect();
        let outputs = vec![RenderedOutput {
            used_vars: ["python".into()].into_iter().collect(),
            candidate_variants: rows.clone(),
            chosen_variant: rows[0].clone(),
            ..Default::default()
        }];
        let universe = VariantUniverse::collect(&outputs, &input);
        let used = used_variant_spec(&universe, &input, &MatrixContext::new(Platform::Linux64));

        let keys = used.keys().map(|k| k.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, vec!["docker_image", "python", "target_platform"]);
        // numpy is not used, so the zip group collapses
        assert_eq!(used.zip_keys, None);
        assert_eq!(used.get(&"python".into()).unwrap().len(), 2);
    }
}
