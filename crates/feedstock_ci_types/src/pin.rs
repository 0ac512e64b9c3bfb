use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{NormalizedKey, Variable};

/// Pin run dependencies by using the versions from the build dependencies.
///
/// Maps a package name to its pin levels, e.g.
///
/// ```yaml
/// pin_run_as_build:
///   python:
///     min_pin: x.x
///     max_pin: x.x
/// ```
///
/// Serialization always emits packages in ascending order and the pin levels
/// of each package in descending order, so that regenerated files are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct PinRunAsBuild(pub BTreeMap<String, BTreeMap<String, Variable>>);

impl PinRunAsBuild {
    /// Returns true if no package is pinned.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of pinned packages.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the pinned package names.
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Get the pin levels of a package.
    pub fn get(&self, package: &str) -> Option<&BTreeMap<String, Variable>> {
        self.0.get(package)
    }

    /// Keep only the packages whose normalized name satisfies `is_used`.
    pub fn retain_used(&mut self, mut is_used: impl FnMut(&NormalizedKey) -> bool) {
        self.0
            .retain(|package, _| is_used(&NormalizedKey::from(package.as_str())));
    }

    /// Override the pins of `self` with the pins of `other`, package by package.
    pub fn extend(&mut self, other: PinRunAsBuild) {
        self.0.extend(other.0);
    }

    /// The canonical emission order: packages ascending, pin levels descending.
    pub fn sorted(&self) -> IndexMap<&str, IndexMap<&str, &Variable>> {
        self.0
            .iter()
            .map(|(package, pins)| {
                let levels = pins
                    .iter()
                    .rev()
                    .map(|(level, spec)| (level.as_str(), spec))
                    .collect();
                (package.as_str(), levels)
            })
            .collect()
    }
}

impl Serialize for PinRunAsBuild {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.sorted().serialize(serializer)
    }
}
