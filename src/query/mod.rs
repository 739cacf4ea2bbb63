// Telemetry is a submodule of query
pub mod telemetry;

mod attrs;
mod builder;
mod eval;
mod exec;
mod results;
mod types;
mod values;

pub use attrs::{Attribute, FieldValue, Lookup, Resolver, StandardResolver, ValueKind};
pub use builder::QueryBuilder;
pub use eval::{CompareOptions, FilterValue, filter_candidates, filter_typed, satisfies};
pub use exec::{CancelToken, QueryExecutor, QueryPlan, execute_collection, execute_query, execute_query_blocking};
pub use results::{ResultRow, ResultSet};
pub use types::{Condition, Operator, Query, QueryPart};
pub use values::{TypedList, ValueToken, parse_list, parse_typed, split_list};
