//! The squished variant specification

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use crate::{NormalizedKey, PinRunAsBuild, Variable, VariantSpecError};

/// A variant specification in its "squished" form: every variable maps to the
/// list of values it can take.
///
/// # Example
///
/// ```yaml
/// python:
///   - "3.9"
///   - "3.10"
/// numpy:
///   - "1.21"
///   - "1.23"
/// zip_keys:
///   - [python, numpy]
/// pin_run_as_build:
///   python:
///     min_pin: x.x
///     max_pin: x.x
/// ```
///
/// A scalar value is read as a single-element list, and a flat `zip_keys`
/// list is read as a single group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawVariantSpec")]
pub struct VariantSpec {
    /// Groups of keys whose values vary together, index by index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_keys: Option<Vec<Vec<NormalizedKey>>>,

    /// Pins that are carried through the matrix unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin_run_as_build: Option<PinRunAsBuild>,

    /// The variant values - a mapping of keys to lists of possible values.
    #[serde(flatten)]
    pub variants: BTreeMap<NormalizedKey, Vec<Variable>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Variable>),
    One(Variable),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ZipKeys {
    Groups(Vec<Vec<NormalizedKey>>),
    Flat(Vec<NormalizedKey>),
}

#[derive(Deserialize)]
struct RawVariantSpec {
    #[serde(default)]
    zip_keys: Option<ZipKeys>,
    #[serde(default)]
    pin_run_as_build: Option<PinRunAsBuild>,
    #[serde(flatten)]
    variants: BTreeMap<NormalizedKey, Option<OneOrMany>>,
}

impl From<RawVariantSpec> for VariantSpec {
    fn from(raw: RawVariantSpec) -> Self {
        let zip_keys = raw.zip_keys.and_then(|zip_keys| match zip_keys {
            ZipKeys::Groups(groups) => Some(groups),
            ZipKeys::Flat(group) if group.is_empty() => None,
            ZipKeys::Flat(group) => Some(vec![group]),
        });

        let variants = raw
            .variants
            .into_iter()
            .filter_map(|(key, value)| match value? {
                OneOrMany::Many(values) => Some((key, values)),
                OneOrMany::One(value) => Some((key, vec![value])),
            })
            .collect();

        VariantSpec {
            zip_keys,
            pin_run_as_build: raw.pin_run_as_build,
            variants,
        }
    }
}

impl VariantSpec {
    /// Create a new empty variant specification
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a variant specification from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, VariantSpecError> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// Load a variant specification from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, VariantSpecError> {
        let input = fs_err::read_to_string(path)
            .map_err(|e| VariantSpecError::IoError(path.to_path_buf(), e))?;
        Self::from_yaml_str(&input).map_err(|e| match e {
            VariantSpecError::InvalidSpec(source) => VariantSpecError::ParseError {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Load multiple variant specification files and merge them in order.
    ///
    /// Keys of a later file replace keys of an earlier file (values are _not_
    /// merged), see [`VariantSpec::merge`].
    pub fn from_files(paths: &[impl AsRef<Path>]) -> Result<Self, VariantSpecError> {
        let mut final_spec = VariantSpec::new();
        for path in paths {
            let path = path.as_ref();
            tracing::info!("Loading variant spec from: {}", path.display());
            final_spec.merge(Self::from_file(path)?);
        }
        Ok(final_spec)
    }

    /// Merge another variant specification into this one
    ///
    /// Variant values are replaced, `zip_keys` from `other` take precedence
    /// and `pin_run_as_build` entries are overridden package by package.
    pub fn merge(&mut self, other: VariantSpec) {
        self.variants.extend(other.variants);

        if other.zip_keys.is_some() {
            self.zip_keys = other.zip_keys;
        }

        if let Some(pins) = other.pin_run_as_build {
            match &mut self.pin_run_as_build {
                Some(existing) => existing.extend(pins),
                None => self.pin_run_as_build = Some(pins),
            }
        }
    }

    /// Insert or update a variant key
    pub fn insert(&mut self, key: impl Into<NormalizedKey>, values: Vec<Variable>) {
        self.variants.insert(key.into(), values);
    }

    /// Get the values for a variant key
    pub fn get(&self, key: &NormalizedKey) -> Option<&Vec<Variable>> {
        self.variants.get(key)
    }

    /// Remove a variant key, returning its values
    pub fn remove(&mut self, key: &NormalizedKey) -> Option<Vec<Variable>> {
        self.variants.remove(key)
    }

    /// Returns true if the key has values in this specification
    pub fn contains_key(&self, key: &NormalizedKey) -> bool {
        self.variants.contains_key(key)
    }

    /// Get all variant keys
    pub fn keys(&self) -> impl Iterator<Item = &NormalizedKey> {
        self.variants.keys()
    }

    /// Check if the specification holds no variables
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Get the number of variant keys
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// The zip groups, or an empty slice if there are none.
    pub fn zip_groups(&self) -> &[Vec<NormalizedKey>] {
        self.zip_keys.as_deref().unwrap_or(&[])
    }

    /// The zip group that contains `key`, if any.
    pub fn zip_group_of(&self, key: &NormalizedKey) -> Option<&Vec<NormalizedKey>> {
        self.zip_groups().iter().find(|group| group.contains(key))
    }

    /// The keys that take more than one distinct value ("loop variables").
    pub fn loop_vars(&self) -> BTreeSet<NormalizedKey> {
        self.variants
            .iter()
            .filter(|(_, values)| values.iter().collect::<HashSet<_>>().len() > 1)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Serialize to YAML string
    pub fn to_yaml_string(&self) -> Result<String, VariantSpecError> {
        Ok(serde_yaml::to_string(self)?)
    }
}
