//! The variant algebra: how a migration is added to a variant spec.
//!
//! Each kind of value has its own merge function and all of them can be
//! swapped out. The defaults are:
//!
//! | value | rule |
//! |---|---|
//! | key with an `ordering` | index by index, the higher ranked value wins |
//! | lists (either side has more than one value) | union, keeping the order |
//! | single values | the migration wins |
//! | `zip_keys` | a group contained in a migration group is replaced by it, others are kept |
//! | `pin_run_as_build` | the migration wins, package by package |
//!
//! Migrations can also ask for a special `operation`; `key_add` is
//! registered by default.

use feedstock_ci_types::{NormalizedKey, PinRunAsBuild, Variable, VariantSpec};
use rattler_conda_types::Version;
use std::{cmp::Ordering, collections::BTreeMap, str::FromStr};

use crate::{document::MigrationDocument, error::MigrationError};

/// Merge the values of one key: `(left, right, ordering)`.
pub type ValueMerge = fn(&[Variable], &[Variable], Option<&[Variable]>) -> Vec<Variable>;

/// Merge two sets of zip groups: `(left, right)`.
pub type ZipKeysMerge = fn(&[Vec<NormalizedKey>], &[Vec<NormalizedKey>]) -> Vec<Vec<NormalizedKey>>;

/// Merge two sets of pins: `(left, right)`.
pub type PinMerge = fn(PinRunAsBuild, PinRunAsBuild) -> PinRunAsBuild;

/// A special operation that replaces the per-key merge entirely.
pub type Operation =
    fn(&VariantAlgebra, VariantSpec, &MigrationDocument) -> Result<VariantSpec, MigrationError>;

/// The name of the default `key_add` operation.
pub const KEY_ADD: &str = "key_add";

/// The table of merge functions used by [`VariantAlgebra::variant_add`].
#[derive(Debug, Clone)]
pub struct VariantAlgebra {
    /// Keys that have an `ordering` in the migration
    pub ordered: ValueMerge,
    /// Keys with more than one value on either side
    pub list: ValueMerge,
    /// Keys with a single value on both sides
    pub scalar: ValueMerge,
    /// `zip_keys`
    pub zip_keys: ZipKeysMerge,
    /// `pin_run_as_build`
    pub pin_run_as_build: PinMerge,
    key_rules: BTreeMap<NormalizedKey, ValueMerge>,
    operations: BTreeMap<String, Operation>,
}

impl Default for VariantAlgebra {
    fn default() -> Self {
        Self {
            ordered: merge_ordered,
            list: merge_union,
            scalar: merge_replace,
            zip_keys: merge_zip_keys,
            pin_run_as_build: merge_pins,
            key_rules: BTreeMap::new(),
            operations: BTreeMap::from([(KEY_ADD.to_string(), key_add as Operation)]),
        }
    }
}

impl VariantAlgebra {
    /// Use `rule` for `key`, regardless of its values.
    pub fn with_key_rule(mut self, key: impl Into<NormalizedKey>, rule: ValueMerge) -> Self {
        self.key_rules.insert(key.into(), rule);
        self
    }

    /// Register an operation that migrations can ask for.
    pub fn with_operation(mut self, name: impl Into<String>, operation: Operation) -> Self {
        self.operations.insert(name.into(), operation);
        self
    }

    /// Merge the values of a key that both sides define.
    pub fn merge_values(
        &self,
        key: &NormalizedKey,
        left: &[Variable],
        right: &[Variable],
        ordering: Option<&[Variable]>,
    ) -> Vec<Variable> {
        let rule = if let Some(rule) = self.key_rules.get(key) {
            *rule
        } else if ordering.is_some() {
            self.ordered
        } else if left.len() > 1 || right.len() > 1 {
            self.list
        } else {
            self.scalar
        };
        rule(left, right, ordering)
    }

    /// Add `migration` to `spec`.
    ///
    /// Keys only one side has are taken as they are. `migrator_ts` and
    /// `__migrator` are never part of the result.
    pub fn variant_add(
        &self,
        mut spec: VariantSpec,
        migration: &MigrationDocument,
    ) -> Result<VariantSpec, MigrationError> {
        let meta = migration.migrator.as_ref();

        if let Some(name) = meta.and_then(|meta| meta.operation.as_deref()) {
            let operation = self
                .operations
                .get(name)
                .ok_or_else(|| MigrationError::UnknownOperation(name.to_string()))?;
            return operation(self, spec, migration);
        }

        for (key, right) in &migration.spec.variants {
            let ordering = meta.and_then(|meta| meta.ordering.get(key)).map(Vec::as_slice);
            let merged = match spec.get(key) {
                Some(left) => self.merge_values(key, left, right, ordering),
                None => right.clone(),
            };
            spec.variants.insert(key.clone(), merged);
        }

        if let Some(right) = &migration.spec.zip_keys {
            spec.zip_keys = Some(match spec.zip_keys.take() {
                Some(left) => (self.zip_keys)(&left, right),
                None => right.clone(),
            });
        }

        if let Some(right) = &migration.spec.pin_run_as_build {
            spec.pin_run_as_build = Some(match spec.pin_run_as_build.take() {
                Some(left) => (self.pin_run_as_build)(left, right.clone()),
                None => right.clone(),
            });
        }

        Ok(spec)
    }
}

/// Compare two values by their rank in `ordering`. Values without a rank
/// lose against ranked ones; two unranked values are compared as versions.
fn compare_ranked(a: &Variable, b: &Variable, ordering: &[Variable]) -> Ordering {
    let rank = |v: &Variable| ordering.iter().position(|o| o == v);
    match (rank(a), rank(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => compare_versions(a, b),
    }
}

/// Compare as conda versions, falling back to the textual form.
fn compare_versions(a: &Variable, b: &Variable) -> Ordering {
    let (a, b) = (a.to_string(), b.to_string());
    match (Version::from_str(&a), Version::from_str(&b)) {
        (Ok(va), Ok(vb)) => va.cmp(&vb),
        _ => a.cmp(&b),
    }
}

/// Index by index the higher ranked value wins; the longer side's tail is
/// kept.
pub fn merge_ordered(
    left: &[Variable],
    right: &[Variable],
    ordering: Option<&[Variable]>,
) -> Vec<Variable> {
    let ordering = ordering.unwrap_or(&[]);
    let common = left.len().min(right.len());

    let mut merged = left
        .iter()
        .zip(right)
        .map(|(l, r)| {
            if compare_ranked(l, r, ordering) == Ordering::Greater {
                l.clone()
            } else {
                r.clone()
            }
        })
        .collect::<Vec<_>>();
    merged.extend(left.iter().skip(common).cloned());
    merged.extend(right.iter().skip(common).cloned());
    merged
}

/// All values of `left`, followed by the values of `right` that are new.
pub fn merge_union(
    left: &[Variable],
    right: &[Variable],
    _ordering: Option<&[Variable]>,
) -> Vec<Variable> {
    let mut merged = left.to_vec();
    for value in right {
        if !merged.contains(value) {
            merged.push(value.clone());
        }
    }
    merged
}

/// The values of `right`.
pub fn merge_replace(
    _left: &[Variable],
    right: &[Variable],
    _ordering: Option<&[Variable]>,
) -> Vec<Variable> {
    right.to_vec()
}

/// Every group of `left` that is contained in a group of `right` is replaced
/// by the largest such group. Other groups of `left` are kept as they are and
/// the remaining groups of `right` are appended.
pub fn merge_zip_keys(
    left: &[Vec<NormalizedKey>],
    right: &[Vec<NormalizedKey>],
) -> Vec<Vec<NormalizedKey>> {
    let mut by_size = right.iter().collect::<Vec<_>>();
    by_size.sort_by_key(|group| std::cmp::Reverse(group.len()));

    let mut merged: Vec<Vec<NormalizedKey>> = Vec::new();
    let groups = left
        .iter()
        .map(|group| {
            by_size
                .iter()
                .find(|candidate| group.iter().all(|key| candidate.contains(key)))
                .map_or(group, |candidate| *candidate)
        })
        .chain(right);
    for group in groups {
        if !merged.contains(group) {
            merged.push(group.clone());
        }
    }
    merged
}

/// Pins of `right` override those of `left`, package by package.
pub fn merge_pins(mut left: PinRunAsBuild, right: PinRunAsBuild) -> PinRunAsBuild {
    left.extend(right);
    left
}

/// Add new values of the primary key, together with the values of the keys
/// zipped with it at the same position.
///
/// Values that are already present are left alone, so applying the same
/// migration twice is a no-op.
pub fn key_add(
    _algebra: &VariantAlgebra,
    mut spec: VariantSpec,
    migration: &MigrationDocument,
) -> Result<VariantSpec, MigrationError> {
    let primary = migration
        .migrator
        .as_ref()
        .and_then(|meta| meta.primary_key.clone())
        .ok_or_else(|| MigrationError::MissingPrimaryKey(KEY_ADD.to_string()))?;

    let Some(new_values) = migration.spec.get(&primary) else {
        return Ok(spec);
    };
    if !spec.contains_key(&primary) {
        return Err(MigrationError::PrimaryKeyNotInSpec(primary.to_string()));
    }

    let partners = spec
        .zip_group_of(&primary)
        .or_else(|| migration.spec.zip_group_of(&primary))
        .map(|group| {
            group
                .iter()
                .filter(|key| **key != primary && spec.contains_key(key))
                .cloned()
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    for (idx, value) in new_values.iter().enumerate() {
        if spec.get(&primary).is_some_and(|values| values.contains(value)) {
            continue;
        }

        let Some(partner_values) = partners
            .iter()
            .map(|key| migration.spec.get(key).and_then(|values| values.get(idx)))
            .collect::<Option<Vec<_>>>()
        else {
            tracing::warn!(
                "Not adding {primary}={value}: the migration has no values for all keys zipped with {primary}"
            );
            continue;
        };

        if let Some(values) = spec.variants.get_mut(&primary) {
            values.push(value.clone());
        }
        for (key, partner_value) in partners.iter().zip(partner_values) {
            if let Some(values) = spec.variants.get_mut(key) {
                values.push(partner_value.clone());
            }
        }
    }

    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn values(values: &[&str]) -> Vec<Variable> {
        values.iter().map(|&v| Variable::from(v)).collect()
    }

    fn spec(yaml: &str) -> VariantSpec {
        VariantSpec::from_yaml_str(yaml).unwrap()
    }

    fn migration(yaml: &str) -> MigrationDocument {
        MigrationDocument::from_yaml_str(yaml).unwrap()
    }

    #[rstest]
    #[case(&["1.0"], &["2.0"], &["2.0"])]
    #[case(&["1.0", "1.1"], &["2.0"], &["1.0", "1.1", "2.0"])]
    #[case(&["1.0"], &["1.0", "2.0"], &["1.0", "2.0"])]
    fn test_default_rules(#[case] left: &[&str], #[case] right: &[&str], #[case] expected: &[&str]) {
        let algebra = VariantAlgebra::default();
        let merged = algebra.merge_values(&"libfoo".into(), &values(left), &values(right), None);
        assert_eq!(merged, values(expected));
    }

    #[rstest]
    #[case(&["None", "11.8"], &["12.0"], &["None", "11.8", "12.0"], &["12.0", "11.8"])]
    #[case(&["12.0"], &["11.8"], &["None", "11.8", "12.0"], &["12.0"])]
    #[case(&["1.10"], &["1.9"], &[], &["1.10"])]
    #[case(&["1.9"], &["2"], &["1.9"], &["1.9"])]
    fn test_ordering_picks_the_higher_rank(
        #[case] left: &[&str],
        #[case] right: &[&str],
        #[case] ordering: &[&str],
        #[case] expected: &[&str],
    ) {
        let ordering = values(ordering);
        let merged = merge_ordered(&values(left), &values(right), Some(&ordering));
        assert_eq!(merged, values(expected));
    }

    #[test]
    fn test_variant_add() {
        let base = spec(
            r#"
python: ["3.9", "3.10"]
libxml2: ["2.11"]
zip_keys:
  - [python, numpy]
pin_run_as_build:
  python:
    min_pin: x.x
"#,
        );
        let migration = migration(
            r#"
__migrator:
  migration_number: 1
migrator_ts: 1700000000
libxml2: ["2.12"]
python: ["3.12"]
libpng: ["1.6"]
zip_keys:
  - [python, numpy, python_impl]
pin_run_as_build:
  python:
    min_pin: x.x
    max_pin: x.x
"#,
        );

        let result = VariantAlgebra::default().variant_add(base, &migration).unwrap();
        assert_eq!(result.get(&"libxml2".into()), Some(&values(&["2.12"])));
        assert_eq!(result.get(&"python".into()), Some(&values(&["3.9", "3.10", "3.12"])));
        assert_eq!(result.get(&"libpng".into()), Some(&values(&["1.6"])));
        assert_eq!(
            result.zip_keys,
            Some(vec![vec!["python".into(), "numpy".into(), "python_impl".into()]])
        );
        assert_eq!(
            result.pin_run_as_build.as_ref().unwrap().get("python").unwrap().len(),
            2
        );
        assert!(!result.contains_key(&"migrator_ts".into()));
        assert!(!result.contains_key(&"__migrator".into()));
    }

    fn groups(groups: &[&[&str]]) -> Vec<Vec<NormalizedKey>> {
        groups
            .iter()
            .map(|group| group.iter().map(|&key| NormalizedKey::from(key)).collect())
            .collect()
    }

    #[rstest]
    #[case::contained(
        &[&["python", "numpy"] as &[&str]],
        &[&["python", "numpy", "python_impl"] as &[&str]],
        &[&["python", "numpy", "python_impl"] as &[&str]]
    )]
    #[case::overlapping(
        &[&["python", "numpy"] as &[&str]],
        &[&["python", "cuda_compiler_version"] as &[&str]],
        &[&["python", "numpy"] as &[&str], &["python", "cuda_compiler_version"]]
    )]
    #[case::disjoint(
        &[&["c_compiler", "cxx_compiler"] as &[&str]],
        &[&["python", "numpy"] as &[&str]],
        &[&["c_compiler", "cxx_compiler"] as &[&str], &["python", "numpy"]]
    )]
    #[case::largest_container_wins(
        &[&["python", "numpy"] as &[&str], &["c_compiler", "cxx_compiler"]],
        &[&["python", "numpy", "python_impl"] as &[&str], &["python", "numpy", "python_impl", "is_abi3"]],
        &[
            &["python", "numpy", "python_impl", "is_abi3"] as &[&str],
            &["c_compiler", "cxx_compiler"],
            &["python", "numpy", "python_impl"],
        ]
    )]
    fn test_zip_keys_merge(
        #[case] left: &[&[&str]],
        #[case] right: &[&[&str]],
        #[case] expected: &[&[&str]],
    ) {
        assert_eq!(merge_zip_keys(&groups(left), &groups(right)), groups(expected));
    }

    #[test]
    fn test_key_add() {
        let base = spec(
            r#"
python: ["3.9", "3.10"]
numpy: ["1.21", "1.23"]
zlib: ["1.2"]
zip_keys:
  - [python, numpy]
"#,
        );
        let migration = migration(
            r#"
__migrator:
  operation: key_add
  primary_key: python
migrator_ts: 1
python: ["3.10", "3.12"]
numpy: ["1.23", "1.26"]
"#,
        );
        let algebra = VariantAlgebra::default();
        let result = algebra.variant_add(base, &migration).unwrap();
        assert_eq!(result.get(&"python".into()), Some(&values(&["3.9", "3.10", "3.12"])));
        assert_eq!(result.get(&"numpy".into()), Some(&values(&["1.21", "1.23", "1.26"])));
        assert_eq!(result.get(&"zlib".into()), Some(&values(&["1.2"])));

        // adding it again changes nothing
        assert_eq!(algebra.variant_add(result.clone(), &migration).unwrap(), result);
    }

    #[test]
    fn test_unknown_operation() {
        let migration = migration("__migrator:\n  operation: key_remove\n  primary_key: python\n");
        let err = VariantAlgebra::default()
            .variant_add(VariantSpec::new(), &migration)
            .unwrap_err();
        assert!(matches!(err, MigrationError::UnknownOperation(op) if op == "key_remove"));
    }

    #[test]
    fn test_custom_key_rule() {
        let algebra = VariantAlgebra::default().with_key_rule("channel_targets", merge_replace);
        let merged = algebra.merge_values(
            &"channel_targets".into(),
            &values(&["conda-forge main", "conda-forge rc"]),
            &values(&["conda-forge gcc13"]),
            None,
        );
        assert_eq!(merged, values(&["conda-forge gcc13"]));
    }
}
