//! # feedstock_ci_matrix
//!
//! The engine that turns the variant build matrix of a feedstock into a
//! deterministic list of CI job configurations.
//!
//! For every platform the recipe is rendered (by a [`Renderer`]), the
//! variants of all outputs are collapsed into one universe, unused
//! variables are trimmed, identical rows are deduplicated and the result is
//! partitioned into one [`Config`] per combination of top-level variables.
//! The values inside every config are sorted and every config gets a
//! stable, length-bounded name, so regenerating the configs from identical
//! input yields byte-identical files.
//!
//! ## Example
//!
//! ```rust
//! use feedstock_ci_matrix::{expand, squish};
//! use feedstock_ci_types::VariantSpec;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = VariantSpec::from_yaml_str(
//!     r#"
//! python: ["3.9", "3.10"]
//! numpy: ["1.21", "1.23"]
//! c_compiler: [gcc, clang]
//! zip_keys:
//!   - [python, numpy]
//! "#,
//! )?;
//!
//! // python and numpy vary together, so this is 2x2 and not 2x2x2
//! let rows = expand(&spec)?;
//! assert_eq!(rows.len(), 4);
//!
//! // and back to the squished form
//! let squished = squish(&rows, spec.zip_groups());
//! assert_eq!(squished[&"python".into()].len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Zip keys
//!
//! Zipped variables must have the same number of values. The `i`-th values
//! of all members belong together, and this alignment is kept through
//! deduplication, partitioning and sorting.

pub mod aggregate;
pub mod combination;
pub mod config;
pub mod context;
pub mod dedup;
pub mod error;
pub mod finalize;
pub mod naming;
pub mod partition;
pub mod platform;
pub mod render;
pub mod sort;
pub mod trim;

pub use aggregate::VariantUniverse;
pub use combination::{expand, squish};
pub use config::{Config, ConfigBody, ConfigValue};
pub use context::{DEFAULT_FALLBACK_DOCKER_IMAGE, MatrixContext};
pub use error::MatrixError;
pub use platform::{CollapsedMatrix, PlatformMatrix, build_platform_matrix, collapse_outputs};
pub use render::{RenderedOutput, Renderer};
