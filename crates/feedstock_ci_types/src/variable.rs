//! This module defines the `Variable` type, the value of a single build
//! variable in one row of the build matrix.
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Visitor};
use std::fmt::{Debug, Display};

/// A scalar value in a variant specification.
///
/// Variant values are strings most of the time (`"3.10"`, `"gcc"`), but
/// booleans and integers are kept as such so they round-trip unchanged.
/// Floating point numbers are converted to strings on deserialization since
/// they almost always denote versions.
///
/// The derived ordering (booleans, then integers, then strings) is what the
/// deterministic sorting of emitted configs relies on.
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Variable {
    /// A boolean value
    Bool(bool),
    /// An integer value
    Integer(i64),
    /// A string value
    String(String),
}

impl Variable {
    /// Returns the string value if this variable is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variable::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Variable {
    fn from(value: bool) -> Self {
        Variable::Bool(value)
    }
}

impl From<i64> for Variable {
    fn from(value: i64) -> Self {
        Variable::Integer(value)
    }
}

impl From<String> for Variable {
    fn from(value: String) -> Self {
        Variable::String(value)
    }
}

impl From<&str> for Variable {
    fn from(value: &str) -> Self {
        Variable::String(value.to_string())
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variable::Bool(b) => write!(f, "{}", b),
            Variable::Integer(i) => write!(f, "{}", i),
            Variable::String(s) => f.write_str(s),
        }
    }
}

impl Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variable::String(s) => write!(f, "\"{}\"", s),
            other => write!(f, "{}", other),
        }
    }
}

impl Serialize for Variable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Variable::Bool(b) => serializer.serialize_bool(*b),
            Variable::Integer(i) => serializer.serialize_i64(*i),
            Variable::String(s) => serializer.serialize_str(s),
        }
    }
}

struct VariableVisitor;

impl Visitor<'_> for VariableVisitor {
    type Value = Variable;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a string, integer, float or boolean")
    }

    fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Variable::Bool(v))
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Variable::Integer(v))
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
        match i64::try_from(v) {
            Ok(v) => Ok(Variable::Integer(v)),
            Err(_) => Ok(Variable::String(v.to_string())),
        }
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Variable::String(v.to_string()))
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Variable::String(v.to_string()))
    }

    fn visit_string<E: serde::de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(Variable::String(v))
    }
}

impl<'de> Deserialize<'de> for Variable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(VariableVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_vs_unquoted() {
        let values: Vec<Variable> =
            serde_yaml::from_str("[\"3.10\", 3.10, 5, true, gcc]").unwrap();
        assert_eq!(values[0], Variable::from("3.10"));
        // unquoted floats lose their trailing zero, like any YAML float would
        assert_eq!(values[1], Variable::from("3.1"));
        assert_eq!(values[2], Variable::Integer(5));
        assert_eq!(values[3], Variable::Bool(true));
        assert_eq!(values[4].as_str(), Some("gcc"));
    }

    #[test]
    fn strings_sort_lexicographically() {
        let mut values = vec![Variable::from("3.9"), Variable::from("3.10")];
        values.sort();
        assert_eq!(values, vec![Variable::from("3.10"), Variable::from("3.9")]);
    }
}
