//! Split the deduplicated matrix into one config per CI job.
//!
//! Top-level variables become separate jobs, every other variable stays in
//! the in-job matrix. Zip groups are respected: a group that contains a
//! top-level variable is split by the values of its top-level members, and
//! rows that share those values end up in the same job.

use feedstock_ci_types::{NormalizedKey, Variable, VariantSpec};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    config::{ConfigBody, ConfigValue},
    sort::sort_config,
};

/// One axis of the job matrix; every entry is a partial config.
type Dimension = Vec<ConfigBody>;

/// Split the entries of a zip group by the values of its top-level members.
///
/// Returns one entry per distinct top-level sub-tuple, in first-seen order.
/// Rows that collapse into the same entry keep all of their values.
fn zip_group_dimension(
    group: &[NormalizedKey],
    columns: &BTreeMap<NormalizedKey, Vec<Variable>>,
    top_level_keys: &BTreeSet<NormalizedKey>,
) -> Dimension {
    let rows = group
        .iter()
        .filter_map(|key| columns.get(key).map(Vec::len))
        .min()
        .unwrap_or(0);

    let mut by_top_level: IndexMap<Vec<&Variable>, Vec<usize>> = IndexMap::new();
    for idx in 0..rows {
        let sub_tuple = group
            .iter()
            .filter(|key| top_level_keys.contains(*key))
            .filter_map(|key| columns.get(key).map(|values| &values[idx]))
            .collect::<Vec<_>>();
        by_top_level.entry(sub_tuple).or_default().push(idx);
    }

    by_top_level
        .into_values()
        .map(|indices| {
            let variables = group
                .iter()
                .filter_map(|key| {
                    let values = columns.get(key)?;
                    let picked = indices.iter().map(|&i| values[i].clone()).collect();
                    Some((key.clone(), ConfigValue::List(picked)))
                })
                .collect();
            ConfigBody {
                variables,
                ..Default::default()
            }
        })
        .collect()
}

/// Break the squished, deduplicated spec up into one [`ConfigBody`] per CI
/// job.
///
/// The result is the cartesian product of the zip group dimensions, the
/// standalone top-level dimensions and the remaining background (if any),
/// with all lists sorted deterministically. Without top-level variables this
/// is exactly one body. Top-level variables without values contribute no
/// dimension.
pub fn break_up_top_level_values(
    top_level_keys: &BTreeSet<NormalizedKey>,
    mut spec: VariantSpec,
) -> Vec<ConfigBody> {
    let zip_groups = spec.zip_groups().to_vec();

    let mut accounted_for_keys: BTreeSet<NormalizedKey> = BTreeSet::new();
    let mut zipped_dimensions: Vec<Dimension> = Vec::new();
    let mut top_level_dimensions: Vec<Dimension> = Vec::new();

    for key in top_level_keys {
        if accounted_for_keys.contains(key) || !spec.contains_key(key) {
            continue;
        }

        if let Some(group) = zip_groups.iter().find(|group| group.contains(key)) {
            accounted_for_keys.extend(group.iter().cloned());

            let columns = group
                .iter()
                .filter_map(|k| Some((k.clone(), spec.remove(k)?)))
                .collect::<BTreeMap<_, _>>();

            let mut dimension = zip_group_dimension(group, &columns, top_level_keys);
            for entry in &mut dimension {
                sort_config(entry, &zip_groups);
            }
            zipped_dimensions.push(dimension);
        } else if let Some(values) = spec.remove(key) {
            // the slice is just this one variable, all others keep their variability
            top_level_dimensions.push(
                values
                    .into_iter()
                    .map(|value| ConfigBody {
                        variables: BTreeMap::from([(key.clone(), ConfigValue::Scalar(value))]),
                        ..Default::default()
                    })
                    .collect(),
            );
        }
    }

    let mut background = ConfigBody {
        variables: spec
            .variants
            .into_iter()
            .map(|(key, values)| (key, ConfigValue::List(values)))
            .collect(),
        zip_keys: spec.zip_keys,
        pin_run_as_build: spec.pin_run_as_build,
    };
    sort_config(&mut background, &zip_groups);

    let mut dimensions = zipped_dimensions;
    dimensions.extend(top_level_dimensions);
    if !background.is_empty() {
        dimensions.push(vec![background]);
    }

    dimensions
        .iter()
        .fold(vec![ConfigBody::default()], |configs, dimension| {
            configs
                .iter()
                .flat_map(|config| dimension.iter().map(move |entry| config.merged(entry)))
                .collect()
        })
}
