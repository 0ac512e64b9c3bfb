//! Structural deduplication of the build matrix.

use feedstock_ci_types::{Assignment, VariantSpec};
use std::collections::BTreeSet;

use crate::{
    combination::{expand, squish},
    error::MatrixError,
    trim::trim,
};

/// Collapse structurally identical rows to one.
///
/// Rows are ordered maps, so two rows with the same pairs compare equal no
/// matter in which order their keys were inserted. The result is in canonical
/// (sorted) order.
pub fn dedup_rows(rows: impl IntoIterator<Item = Assignment>) -> Vec<Assignment> {
    rows.into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Blow the spec out into rows, deduplicate them and squish them back.
///
/// Both trims are applied again afterwards since the round trip can leave a
/// zip group with less than two members.
pub fn deduplicate(spec: VariantSpec) -> Result<VariantSpec, MatrixError> {
    let rows = dedup_rows(expand(&spec)?);
    let variants = squish(&rows, spec.zip_groups());

    let mut deduplicated = VariantSpec {
        zip_keys: spec.zip_keys,
        pin_run_as_build: spec.pin_run_as_build,
        variants,
    };
    trim(&mut deduplicated);

    tracing::debug!("used_key_values {:?}", deduplicated);
    Ok(deduplicated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedstock_ci_types::{NormalizedKey, Variable};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_identical_rows_collapse() {
        let mut a = Assignment::new();
        a.insert("python".into(), "3.9".into());
        a.insert("numpy".into(), "1.21".into());

        // same pairs, different insertion order
        let mut b = Assignment::new();
        b.insert("numpy".into(), "1.21".into());
        b.insert("python".into(), "3.9".into());

        let mut c = a.clone();
        c.insert("python".into(), "3.10".into());

        let rows = dedup_rows(vec![a.clone(), b, c.clone(), a]);
        assert_eq!(rows.len(), 2);
        assert!(rows.contains(&c));
    }

    #[test]
    fn test_duplicate_zipped_values_collapse() {
        let spec = VariantSpec::from_yaml_str(
            r#"
python: ["3.9", "3.10", "3.9"]
numpy: ["1.21", "1.23", "1.21"]
zlib: ["1.2", "1.2"]
zip_keys:
  - [python, numpy]
"#,
        )
        .unwrap();

        let deduplicated = deduplicate(spec).unwrap();
        assert_eq!(deduplicated.get(&"python".into()).unwrap().len(), 2);
        assert_eq!(deduplicated.get(&"numpy".into()).unwrap().len(), 2);
        assert_eq!(
            deduplicated.get(&"zlib".into()).unwrap(),
            &vec![Variable::from("1.2")]
        );
        assert_eq!(
            deduplicated.zip_keys,
            Some(vec![vec![NormalizedKey::from("python"), "numpy".into()]])
        );
    }
}
