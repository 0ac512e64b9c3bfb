//! # feedstock_ci_types
//!
//! The data model shared by the feedstock-ci crates:
//!
//! - [`NormalizedKey`]: the name of a build variable
//! - [`Variable`]: a single scalar value of a build variable
//! - [`Assignment`]: one row of the build matrix
//! - [`PinRunAsBuild`]: package pins carried through the matrix untouched
//! - [`VariantSpec`]: the "squished" dict-of-lists form of a set of rows

mod error;
mod normalized_key;
mod pin;
mod spec;
mod variable;

use std::collections::BTreeMap;

pub use error::VariantSpecError;
pub use normalized_key::NormalizedKey;
pub use pin::PinRunAsBuild;
pub use spec::VariantSpec;
pub use variable::Variable;

/// One concrete row of the build matrix.
///
/// The map is ordered by key, so two assignments with the same pairs are
/// structurally equal regardless of insertion order.
pub type Assignment = BTreeMap<NormalizedKey, Variable>;
