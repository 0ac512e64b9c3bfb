//! # feedstock_ci_migrations
//!
//! Migrations roll out ecosystem-wide pin changes over time. Each one is a
//! partial variant spec with a timestamp (`migrator_ts`) and some metadata
//! (`__migrator`). Before the recipe of a feedstock is rendered, the active
//! migrations are added to its variant spec in timestamp order.
//!
//! ```rust
//! use feedstock_ci_migrations::{MigrationDocument, VariantAlgebra};
//! use feedstock_ci_types::VariantSpec;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = VariantSpec::from_yaml_str("libxml2: [\"2.11\"]\npython: [\"3.9\", \"3.10\"]\n")?;
//! let migration = MigrationDocument::from_yaml_str(
//!     "migrator_ts: 1700000000\nlibxml2: [\"2.12\"]\npython: [\"3.12\"]\n",
//! )?;
//!
//! let migrated = VariantAlgebra::default().variant_add(spec, &migration)?;
//! assert_eq!(migrated.get(&"libxml2".into()).unwrap().len(), 1);
//! assert_eq!(migrated.get(&"python".into()).unwrap().len(), 3);
//! # Ok(())
//! # }
//! ```

pub mod algebra;
mod apply;
pub mod discovery;
mod document;
mod error;

pub use algebra::VariantAlgebra;
pub use apply::{Migration, apply_migrations, migrate_combined_spec};
pub use discovery::{LOCAL_MIGRATIONS_DIR, MigrationFile, migrations_in_dir, select_migrations};
pub use document::{MigrationDocument, MigrationHeader, MigrationTimestamp, MigratorMeta};
pub use error::MigrationError;
