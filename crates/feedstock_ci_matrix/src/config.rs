//! The records emitted for every CI job

use feedstock_ci_types::{NormalizedKey, PinRunAsBuild, Variable};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// The value of a variable inside a [`Config`].
///
/// Standalone top-level variables resolve to a single value per CI job,
/// everything else keeps a list that forms the in-job build matrix. Both are
/// written as lists so that every emitted file has the `key: [values]` shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConfigValue {
    /// A single value, fixed for the whole CI job
    Scalar(Variable),
    /// The values of the in-job matrix
    List(Vec<Variable>),
}

impl ConfigValue {
    /// All values, a scalar being a one-element slice.
    pub fn values(&self) -> &[Variable] {
        match self {
            ConfigValue::Scalar(value) => std::slice::from_ref(value),
            ConfigValue::List(values) => values,
        }
    }

    /// The first value, used for naming.
    pub fn first(&self) -> Option<&Variable> {
        self.values().first()
    }

    /// Returns true if this value is single-valued.
    pub fn is_scalar(&self) -> bool {
        matches!(self, ConfigValue::Scalar(_))
    }

    /// Reduce the value to its first element, keeping it list-shaped.
    pub(crate) fn truncate_to_first(&mut self) {
        if let ConfigValue::List(values) = self {
            values.truncate(1);
        }
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values().serialize(serializer)
    }
}

/// The content of one CI job before it is named.
///
/// This is also the shape of a single entry of a partitioning dimension;
/// merging entries of different dimensions produces the final body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigBody {
    /// Variables of the job
    pub variables: BTreeMap<NormalizedKey, ConfigValue>,
    /// Zip groups that still hold for the in-job matrix
    pub zip_keys: Option<Vec<Vec<NormalizedKey>>>,
    /// Pins carried through to the job
    pub pin_run_as_build: Option<PinRunAsBuild>,
}

impl ConfigBody {
    /// Returns true if the body carries nothing at all.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.zip_keys.is_none() && self.pin_run_as_build.is_none()
    }

    /// Get the value of a variable
    pub fn get(&self, key: &NormalizedKey) -> Option<&ConfigValue> {
        self.variables.get(key)
    }

    /// Merge `other` into a copy of `self`; values of `other` win.
    pub(crate) fn merged(&self, other: &ConfigBody) -> ConfigBody {
        let mut result = self.clone();
        result
            .variables
            .extend(other.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        if other.zip_keys.is_some() {
            result.zip_keys = other.zip_keys.clone();
        }
        if other.pin_run_as_build.is_some() {
            result.pin_run_as_build = other.pin_run_as_build.clone();
        }
        result
    }
}

/// A fully resolved CI job configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Deterministic name, used as file name of the emitted config
    pub config_name: String,
    /// Length-bounded variant of the name for places with tight limits
    pub short_config_name: String,
    /// The platform the packages are built for (e.g. `linux-64`)
    pub platform: String,
    /// The platform the CI job runs on (e.g. `linux-64`)
    pub build_platform: String,
    /// Whether the built packages are uploaded
    pub upload: bool,
    /// The variables, zip keys and pins of the job
    pub body: ConfigBody,
}

/// One entry of an emitted config document.
#[derive(Serialize)]
#[serde(untagged)]
enum DocumentEntry<'a> {
    Value(&'a ConfigValue),
    ZipKeys(&'a Vec<Vec<NormalizedKey>>),
    Pins(&'a PinRunAsBuild),
}

impl Config {
    /// The YAML document of this config: keys in ascending order, variables
    /// as lists, `zip_keys` as list of lists and `pin_run_as_build` with
    /// packages ascending and pin levels descending.
    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&ConfigDocument(self))
    }
}

/// Serializes a [`Config`] as the document that is written to disk.
pub struct ConfigDocument<'a>(pub &'a Config);

impl Serialize for ConfigDocument<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = &self.0.body;
        let mut entries: Vec<(&str, DocumentEntry<'_>)> = body
            .variables
            .iter()
            .map(|(key, value)| (key.as_str(), DocumentEntry::Value(value)))
            .collect();
        if let Some(zip_keys) = &body.zip_keys {
            entries.push(("zip_keys", DocumentEntry::ZipKeys(zip_keys)));
        }
        if let Some(pins) = &body.pin_run_as_build {
            entries.push(("pin_run_as_build", DocumentEntry::Pins(pins)));
        }
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        serializer.collect_map(entries)
    }
}
