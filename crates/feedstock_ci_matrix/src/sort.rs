//! Deterministic ordering of the values inside a config, so that regenerated
//! files only change when the matrix does.

use feedstock_ci_types::{NormalizedKey, Variable};
use std::collections::BTreeMap;

use crate::config::{ConfigBody, ConfigValue};

/// The permutation that sorts `seq`. Equal elements keep their order.
fn argsort<T: Ord>(seq: &[T]) -> Vec<usize> {
    let mut indices = (0..seq.len()).collect::<Vec<_>>();
    indices.sort_by_key(|&i| &seq[i]);
    indices
}

/// Sort all list values of `body`.
///
/// The members of a zip group are sorted together: the rows of the group are
/// sorted as tuples and the resulting permutation is applied to every member,
/// keeping the columns aligned. All other lists are sorted on their own.
/// Scalars are left alone; `pin_run_as_build` is ordered when it is written.
pub fn sort_config(body: &mut ConfigBody, zip_groups: &[Vec<NormalizedKey>]) {
    let groups = zip_groups
        .iter()
        .map(|group| {
            group
                .iter()
                .filter(|key| matches!(body.variables.get(*key), Some(ConfigValue::List(_))))
                .cloned()
                .collect::<Vec<_>>()
        })
        .filter(|group| !group.is_empty());

    let mut sorting_order: BTreeMap<NormalizedKey, Vec<usize>> = BTreeMap::new();
    for group in groups {
        let columns = group
            .iter()
            .map(|key| body.variables[key].values())
            .collect::<Vec<_>>();
        let rows = columns.iter().map(|column| column.len()).min().unwrap_or(0);
        let tuples = (0..rows)
            .map(|idx| columns.iter().map(|column| &column[idx]).collect::<Vec<_>>())
            .collect::<Vec<_>>();

        let order = argsort(&tuples);
        for key in group {
            sorting_order.insert(key, order.clone());
        }
    }

    for (key, value) in body.variables.iter_mut() {
        let ConfigValue::List(values) = value else {
            continue;
        };
        match sorting_order.get(key) {
            Some(order) => {
                let permuted: Vec<Variable> = order.iter().map(|&i| values[i].clone()).collect();
                *values = permuted;
            }
            None => values.sort(),
        }
    }
}
