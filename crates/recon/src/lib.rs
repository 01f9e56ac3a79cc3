//! Fox112 → FeuerON person reconciliation.
//!
//! Pure pipeline crate: receives decoded cell grids, returns import rows and a
//! run summary. File decoding lives in `feuermig-io`.

pub mod config;
pub mod emit;
pub mod engine;
pub mod error;
pub mod exclusion;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod reader;
pub mod rows;
pub mod schema;
pub mod summary;

pub use config::{MigrationConfig, MigrationMode, ReportKind};
pub use engine::{run, MigrationInput, MigrationResult};
pub use error::{MigrateError, ValidationError};
pub use exclusion::ExclusionSet;
pub use model::{ImportRow, PersonRecord, Side, SkipEntry, SkipReason};
pub use reader::{Grid, ReadOutput};
pub use summary::RunSummary;
