//! The on-disk shape of a migration
//!
//! ```yaml
//! __migrator:
//!   kind: version
//!   migration_number: 1
//!   use_local: false
//!   ordering:
//!     cuda_compiler_version: [None, "11.8", "12.0"]
//! migrator_ts: 1701388800.0
//! libxml2: ["2.12"]
//! ```
//!
//! Everything apart from `migrator_ts` and `__migrator` is a (partial)
//! variant spec.

use feedstock_ci_types::{NormalizedKey, Variable, VariantSpec};
use serde::{Deserialize, Deserializer};
use std::{cmp::Ordering, collections::BTreeMap, fmt, path::Path};

use crate::error::MigrationError;

/// Accepts any YAML scalar and keeps its textual form.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Integer(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::String(s) => s,
        }
    }
}

fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Scalar::deserialize(deserializer).map(String::from)
}

/// `use_local` is a boolean, but older files spell it as a string.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Bool(b) => Ok(b),
        other => Ok(String::from(other).eq_ignore_ascii_case("true")),
    }
}

fn default_migration_number() -> String {
    "1".to_string()
}

/// The `migrator_ts` of a migration.
///
/// Timestamps are matched by their textual form and ordered numerically when
/// both sides are numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct MigrationTimestamp(#[serde(deserialize_with = "scalar_string")] String);

impl MigrationTimestamp {
    /// Create a timestamp from its textual form
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The textual form of the timestamp
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<f64> {
        self.0.parse::<f64>().ok().filter(|f| f.is_finite())
    }
}

impl Ord for MigrationTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.total_cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for MigrationTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MigrationTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `__migrator` metadata of a migration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MigratorMeta {
    /// Bumped when a migration is changed in an incompatible way
    #[serde(default = "default_migration_number", deserialize_with = "scalar_string")]
    pub migration_number: String,

    /// Prefer the feedstock's copy over the shared one
    #[serde(default, deserialize_with = "lenient_bool")]
    pub use_local: bool,

    /// Per-key value rankings; the higher ranked value wins a merge
    #[serde(default)]
    pub ordering: BTreeMap<NormalizedKey, Vec<Variable>>,

    /// A special merge operation, e.g. `key_add`
    #[serde(default)]
    pub operation: Option<String>,

    /// The key the operation is driven by
    #[serde(default)]
    pub primary_key: Option<NormalizedKey>,
}

impl Default for MigratorMeta {
    fn default() -> Self {
        Self {
            migration_number: default_migration_number(),
            use_local: false,
            ordering: BTreeMap::new(),
            operation: None,
            primary_key: None,
        }
    }
}

/// Just the fields needed to select migrations; the rest of the file is not
/// looked at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MigrationHeader {
    /// The timestamp, `None` if the file has none
    #[serde(default)]
    pub migrator_ts: Option<MigrationTimestamp>,

    /// The migrator metadata
    #[serde(default, rename = "__migrator")]
    pub migrator: Option<MigratorMeta>,
}

impl MigrationHeader {
    /// The migration number, `"1"` if not given
    pub fn migration_number(&self) -> &str {
        self.migrator
            .as_ref()
            .map(|meta| meta.migration_number.as_str())
            .unwrap_or("1")
    }

    /// Whether the local copy should be used
    pub fn use_local(&self) -> bool {
        self.migrator.as_ref().is_some_and(|meta| meta.use_local)
    }
}

/// A complete migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MigrationDocument {
    /// The timestamp, `None` if the file has none
    #[serde(default)]
    pub migrator_ts: Option<MigrationTimestamp>,

    /// The migrator metadata
    #[serde(default, rename = "__migrator")]
    pub migrator: Option<MigratorMeta>,

    /// The variant values the migration changes
    #[serde(flatten)]
    pub spec: VariantSpec,
}

fn parse_yaml<T>(input: &str) -> Result<T, serde_yaml::Error>
where
    T: Default + for<'de> Deserialize<'de>,
{
    let value: serde_yaml::Value = serde_yaml::from_str(input)?;
    if value.is_null() {
        return Ok(T::default());
    }
    serde_yaml::from_value(value)
}

fn read(path: &Path) -> Result<String, MigrationError> {
    fs_err::read_to_string(path).map_err(|e| MigrationError::IoError(path.to_path_buf(), e))
}

impl MigrationHeader {
    /// Read the header of a migration file.
    pub fn from_file(path: &Path) -> Result<Self, MigrationError> {
        parse_yaml(&read(path)?).map_err(|source| MigrationError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl MigrationDocument {
    /// Parse a migration from a YAML string.
    pub fn from_yaml_str(input: &str) -> Result<Self, serde_yaml::Error> {
        parse_yaml(input)
    }

    /// Read a migration file.
    pub fn from_file(path: &Path) -> Result<Self, MigrationError> {
        Self::from_yaml_str(&read(path)?).map_err(|source| MigrationError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns true if the migration changes nothing.
    pub fn is_empty(&self) -> bool {
        self.migrator.is_none()
            && self.spec.is_empty()
            && self.spec.zip_keys.is_none()
            && self.spec.pin_run_as_build.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_parse_migration() {
        let doc = MigrationDocument::from_yaml_str(
            r#"
__migrator:
  kind: version
  migration_number: 2
  commit_message: Rebuild for libxml2 2.12
  ordering:
    cuda_compiler_version: [None, "11.8"]
migrator_ts: 1701388800.123
libxml2:
  - "2.12"
"#,
        )
        .unwrap();

        assert_eq!(doc.migrator_ts, Some(MigrationTimestamp::new("1701388800.123")));
        let meta = doc.migrator.unwrap();
        assert_eq!(meta.migration_number, "2");
        assert!(!meta.use_local);
        assert_eq!(meta.ordering[&"cuda_compiler_version".into()].len(), 2);
        assert_eq!(doc.spec.keys().map(|k| k.as_str()).collect::<Vec<_>>(), vec!["libxml2"]);
    }

    #[rstest]
    #[case("use_local: true", true)]
    #[case("use_local: \"True\"", true)]
    #[case("use_local: \"false\"", false)]
    #[case("kind: version", false)]
    fn test_use_local(#[case] meta: &str, #[case] expected: bool) {
        let header: MigrationHeader =
            serde_yaml::from_str(&format!("__migrator:\n  {meta}\nmigrator_ts: 1\n")).unwrap();
        assert_eq!(header.use_local(), expected);
        assert_eq!(header.migration_number(), "1");
    }

    #[test]
    fn test_missing_fields() {
        let doc = MigrationDocument::from_yaml_str("").unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.migrator_ts, None);
    }

    #[test]
    fn test_timestamp_order() {
        let mut timestamps = ["10", "9.5", "abc", "100"]
            .into_iter()
            .map(MigrationTimestamp::new)
            .collect::<Vec<_>>();
        timestamps.sort();
        assert_eq!(
            timestamps.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            vec!["9.5", "10", "100", "abc"]
        );
    }
}
