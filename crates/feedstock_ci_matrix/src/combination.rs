//! Conversion between the squished (dict-of-lists) form of a variant
//! specification and its expanded (list-of-rows) form.

use feedstock_ci_types::{Assignment, NormalizedKey, Variable, VariantSpec};
use indexmap::IndexSet;
use std::collections::BTreeMap;

use crate::error::MatrixError;

/// Internal representation of a dimension of the build matrix
#[derive(Debug, Clone)]
enum VariantKey {
    /// A single key with multiple possible values
    Key(NormalizedKey, Vec<Variable>),
    /// A zip key - multiple keys that are zipped together
    ZipKey(BTreeMap<NormalizedKey, Vec<Variable>>),
}

impl VariantKey {
    /// Get the number of variants for this key
    pub fn len(&self) -> usize {
        match self {
            VariantKey::Key(_, values) => values.len(),
            VariantKey::ZipKey(map) => map.values().next().map(|v| v.len()).unwrap_or(0),
        }
    }

    /// Get the variant at the given index
    pub fn at(&self, index: usize) -> Option<Vec<(NormalizedKey, Variable)>> {
        match self {
            VariantKey::Key(key, values) => {
                values.get(index).map(|v| vec![(key.clone(), v.clone())])
            }
            VariantKey::ZipKey(map) => {
                let mut result = Vec::new();
                for (key, values) in map {
                    if let Some(value) = values.get(index) {
                        result.push((key.clone(), value.clone()));
                    }
                }
                if result.len() == map.len() {
                    Some(result)
                } else {
                    None
                }
            }
        }
    }
}

/// Recursively compute all combinations of variants
fn find_combinations(
    variant_keys: &[VariantKey],
    index: usize,
    current: &mut Vec<(NormalizedKey, Variable)>,
    result: &mut Vec<Assignment>,
) {
    if index == variant_keys.len() {
        result.push(current.iter().cloned().collect());
        return;
    }

    for i in 0..variant_keys[index].len() {
        if let Some(items) = variant_keys[index].at(i) {
            current.extend(items.clone());
            find_combinations(variant_keys, index + 1, current, result);
            for _ in 0..items.len() {
                current.pop();
            }
        }
    }
}

/// The members of each zip group that actually have values in `variants`.
///
/// Groups that end up with less than two present members do not constrain
/// anything and are dropped.
fn present_zip_groups(
    variants: &BTreeMap<NormalizedKey, Vec<Variable>>,
    zip_keys: &[Vec<NormalizedKey>],
) -> Vec<Vec<NormalizedKey>> {
    zip_keys
        .iter()
        .map(|group| {
            group
                .iter()
                .filter(|key| variants.contains_key(key))
                .cloned()
                .collect::<Vec<_>>()
        })
        .filter(|group| group.len() > 1)
        .collect()
}

/// Expand a squished variant specification into one [`Assignment`] per row.
///
/// Independent keys are cross-multiplied, the members of a zip group vary
/// index by index. `zip_keys` and `pin_run_as_build` are not part of the rows.
pub fn expand(spec: &VariantSpec) -> Result<Vec<Assignment>, MatrixError> {
    let groups = present_zip_groups(&spec.variants, spec.zip_groups());
    validate_zip_keys(&spec.variants, &groups)?;

    let zipped = groups.iter().map(|group| {
        VariantKey::ZipKey(
            group
                .iter()
                .filter_map(|key| Some((key.clone(), spec.variants.get(key)?.clone())))
                .collect(),
        )
    });

    let independent = spec
        .variants
        .iter()
        .filter(|(key, _)| !groups.iter().any(|group| group.contains(key)))
        .map(|(key, values)| VariantKey::Key(key.clone(), values.clone()));

    let all_keys = zipped.chain(independent).collect::<Vec<_>>();

    let mut combinations = Vec::new();
    let mut current = Vec::new();
    find_combinations(&all_keys, 0, &mut current, &mut combinations);
    Ok(combinations)
}

/// Squish a list of rows back into a dict-of-lists.
///
/// Independent keys keep their distinct values, zip group members keep their
/// distinct aligned tuples. Both keep first-seen order; a row only
/// contributes to a zip group if it has values for all of its members.
pub fn squish(
    rows: &[Assignment],
    zip_keys: &[Vec<NormalizedKey>],
) -> BTreeMap<NormalizedKey, Vec<Variable>> {
    let mut independent: BTreeMap<NormalizedKey, IndexSet<Variable>> = BTreeMap::new();
    for row in rows {
        for (key, value) in row {
            if zip_keys.iter().any(|group| group.contains(key)) {
                continue;
            }
            independent
                .entry(key.clone())
                .or_default()
                .insert(value.clone());
        }
    }

    let mut squished: BTreeMap<NormalizedKey, Vec<Variable>> = independent
        .into_iter()
        .map(|(key, values)| (key, values.into_iter().collect()))
        .collect();

    for group in zip_keys {
        let members = group
            .iter()
            .filter(|key| rows.iter().any(|row| row.contains_key(*key)))
            .collect::<Vec<_>>();

        let tuples = rows
            .iter()
            .filter_map(|row| {
                members
                    .iter()
                    .map(|key| row.get(*key).cloned())
                    .collect::<Option<Vec<_>>>()
            })
            .collect::<IndexSet<_>>();

        for (idx, key) in members.iter().enumerate() {
            squished.insert(
                (*key).clone(),
                tuples.iter().map(|tuple| tuple[idx].clone()).collect(),
            );
        }
    }

    squished
}

/// Validate that zip groups have matching lengths.
///
/// Zip groups where some keys are missing from the variants map are skipped,
/// since those keys may not be used for the current platform.
pub(crate) fn validate_zip_keys(
    variants: &BTreeMap<NormalizedKey, Vec<Variable>>,
    zip_keys: &[Vec<NormalizedKey>],
) -> Result<(), MatrixError> {
    for zip in zip_keys {
        if zip.len() < 2 {
            return Err(MatrixError::InvalidZipKeyStructure);
        }

        let mut prev_len = None;
        for key in zip {
            let Some(value) = variants.get(key) else {
                continue;
            };

            if let Some(l) = prev_len
                && l != value.len()
            {
                return Err(MatrixError::InvalidZipKeyLength(key.normalize()));
            }
            prev_len = Some(value.len());
        }
    }
    Ok(())
}
