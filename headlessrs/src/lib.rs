pub mod config;
pub mod date_mode;
pub mod dialect;
pub mod error;
pub mod expr_utils;
pub mod filters;
pub mod logging;
pub mod models;
pub mod query_builder;
pub mod registry;

use std::path::Path;

use crate::error::Result;
use crate::registry::SchemaRegistry;

/// Load a schema directory and compile `request` against it with default
/// collaborators.
pub fn compile_from_dir<P: AsRef<Path>>(
    schema_dir: P,
    request: &StructQueryParam,
    available: Option<&models::ItemDateRange>,
) -> Result<SqlClauses> {
    let registry = SchemaRegistry::load_from_dir(schema_dir)?;
    SqlBuilder::new(&HeadlessConfig::load_default()).build(&registry, request, available)
}

pub use config::HeadlessConfig;
pub use dialect::{compare_versions, DialectChecker, EngineType};
pub use error::HeadlessError;
pub use models::StructQueryParam;
pub use query_builder::{SqlBuilder, SqlClauses};
