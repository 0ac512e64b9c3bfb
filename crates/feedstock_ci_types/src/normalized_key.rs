use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// A key in a variant specification.
///
/// Keys compare, hash and sort by their normalized form (`-`, `_` and `.` are
/// treated as the same character), but serialize as written so emitted files
/// keep the spelling of the input.
#[derive(Debug, Clone, Deserialize)]
pub struct NormalizedKey(pub String);

impl NormalizedKey {
    /// Returns the normalized form of the key.
    pub fn normalize(&self) -> String {
        self.0
            .chars()
            .map(|c| match c {
                '-' | '_' | '.' => '_',
                x => x,
            })
            .collect()
    }

    /// The key as it was written.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for NormalizedKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl Hash for NormalizedKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalize().hash(state)
    }
}

impl PartialEq for NormalizedKey {
    fn eq(&self, other: &Self) -> bool {
        self.normalize() == other.normalize()
    }
}

impl Eq for NormalizedKey {}

impl PartialOrd for NormalizedKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NormalizedKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.normalize().cmp(&other.normalize())
    }
}

impl std::fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// For convenience, implement From<String> and From<&str>
impl From<String> for NormalizedKey {
    fn from(s: String) -> Self {
        NormalizedKey(s)
    }
}

impl From<&str> for NormalizedKey {
    fn from(s: &str) -> Self {
        NormalizedKey(s.to_string())
    }
}

impl PartialEq<str> for NormalizedKey {
    fn eq(&self, other: &str) -> bool {
        self.normalize() == NormalizedKey::from(other).normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashes_and_underscores_compare_equal() {
        let a = NormalizedKey::from("libfoo-devel");
        let b = NormalizedKey::from("libfoo_devel");
        assert_eq!(a, b);
        assert_eq!(a.normalize(), "libfoo_devel");
        assert_eq!(&a, "libfoo.devel");
    }

    #[test]
    fn serializes_original_spelling() {
        let key = NormalizedKey::from("c-compiler");
        assert_eq!(serde_yaml::to_string(&key).unwrap().trim(), "c-compiler");
    }
}
