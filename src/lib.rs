//! Metadata query engine for camera-trap collections.
//!
//! Each collection is a set of Camtrap deployment, media and observation
//! records. A [`Query`] is an ordered list of attribute/value condition
//! pairs; running it narrows every collection's media rows independently
//! and merges the surviving file paths into a [`ResultSet`].
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use camtrap_query::{CsvOptions, QueryBuilder, QueryConfig, execute_query_blocking, load_collection_dir};
//!
//! # fn main() -> Result<(), camtrap_query::QueryError> {
//! let (records, _report) = load_collection_dir("cam-a", Path::new("data/cam-a"), &CsvOptions::default())?;
//! let query = QueryBuilder::new(true, false).species(["Puma concolor"]).year_range(2020, 2021).build();
//! let results = execute_query_blocking(&query, &[Arc::new(records)], &QueryConfig::default())?;
//! for row in &results {
//!     println!("{row}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod logger;
pub mod query;
pub mod records;
pub mod utils;

pub use config::QueryConfig;
pub use errors::QueryError;
pub use query::{
    Attribute, CancelToken, Operator, Query, QueryBuilder, QueryExecutor, QueryPart, ResultRow, ResultSet,
    execute_query, execute_query_blocking,
};
pub use records::{CollectionRecords, CsvOptions, LoadReport, load_collection_dir, save_collection_dir};
