use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::Semaphore;

use super::attrs::{Attribute, Resolver, StandardResolver};
use super::eval::{CompareOptions, filter_typed};
use super::results::{ResultRow, ResultSet};
use super::telemetry;
use super::types::{Condition, Operator, Query, QueryPart};
use super::values::{TypedList, parse_typed};
use crate::config::QueryConfig;
use crate::errors::QueryError;
use crate::records::{CollectionRecords, Media};
use crate::utils::num::{u128_to_u64_saturating, usize_to_u64};

/// Cooperative cancellation shared between a caller and running tasks.
/// Checked before each condition of each collection.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
struct Step {
    attribute: Attribute,
    operator: Operator,
    values: TypedList,
}

/// A query with every condition pair resolved and its values parsed.
///
/// Compiled once and shared read-only by all collection tasks.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    steps: Vec<Step>,
    distinct: bool,
    opts: CompareOptions,
}

impl QueryPlan {
    /// # Errors
    /// `MalformedCondition` when the entries are not ATTRIBUTE/VALUE pairs,
    /// `UnknownAttribute`, `MalformedValue` or `LimitExceeded` for a bad pair.
    pub fn compile(query: &Query, config: &QueryConfig) -> Result<Self, QueryError> {
        let conditions = query.conditions();
        let mut steps = Vec::with_capacity(conditions.len() / 2);
        for (i, pair) in conditions.chunks(2).enumerate() {
            let (attr, value) = match pair {
                [a, v] if a.part == QueryPart::Attribute && v.part == QueryPart::Value => (a, v),
                [a, v] => {
                    return Err(QueryError::MalformedCondition(format!(
                        "pair {i}: expected ATTRIBUTE then VALUE, got {:?} then {:?}",
                        a.part, v.part
                    )));
                }
                _ => {
                    return Err(QueryError::MalformedCondition(format!(
                        "pair {i}: trailing {:?} entry without a partner",
                        pair[0].part
                    )));
                }
            };
            steps.push(compile_step(attr, value, config)?);
        }
        Ok(Self {
            steps,
            distinct: query.is_distinct(),
            opts: CompareOptions { case_insensitive: query.is_case_insensitive(), epsilon: config.epsilon },
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn is_distinct(&self) -> bool {
        self.distinct
    }
}

fn compile_step(attr: &Condition, value: &Condition, config: &QueryConfig) -> Result<Step, QueryError> {
    let attribute: Attribute = attr.value.parse()?;
    let values = parse_typed(attribute, &value.value)?;
    if values.len() > config.max_in_values {
        return Err(QueryError::LimitExceeded(format!(
            "{attribute} {} carries {} values (max {})",
            value.operator,
            values.len(),
            config.max_in_values
        )));
    }
    Ok(Step { attribute, operator: value.operator, values })
}

/// Runs every step of `plan` against one collection, narrowing the media set
/// in order. Stops as soon as no candidate is left.
///
/// # Errors
/// `Cancelled` when `cancel` fires between steps; otherwise any resolver error.
pub fn execute_collection(
    plan: &QueryPlan,
    records: &CollectionRecords,
    resolver: &dyn Resolver,
    cancel: &CancelToken,
) -> Result<Vec<ResultRow>, QueryError> {
    let start = Instant::now();
    let mut candidates: Vec<&Media> = records.media().iter().collect();
    let mut evaluated = 0usize;
    for step in &plan.steps {
        if candidates.is_empty() {
            break;
        }
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        candidates = filter_typed(step.attribute, step.operator, &step.values, &candidates, &plan.opts, |m| {
            resolver.resolve(step.attribute, m, records)
        })?;
        evaluated += 1;
    }
    let rows: Vec<ResultRow> = candidates.iter().map(|m| ResultRow::from_media(records.bucket(), m)).collect();
    telemetry::record_collection(usize_to_u64(evaluated), usize_to_u64(rows.len()));
    let bench = serde_json::json!({
        "bench": "query",
        "op": "collection",
        "collection": records.bucket(),
        "duration_ms": u128_to_u64_saturating(start.elapsed().as_millis()),
        "media": usize_to_u64(records.media().len()),
        "steps": usize_to_u64(plan.steps.len()),
        "evaluated": usize_to_u64(evaluated),
        "matched": usize_to_u64(rows.len())
    });
    crate::dev6!("{bench}");
    Ok(rows)
}

/// Runs queries over many collections at once.
///
/// Each collection is evaluated on the blocking pool, at most
/// `max_concurrency` at a time. Results are merged in the order the
/// collections were given, so distinct mode keeps the row from the earliest
/// collection.
#[derive(Clone)]
pub struct QueryExecutor {
    config: QueryConfig,
    resolver: Arc<dyn Resolver>,
    cancel: CancelToken,
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new(QueryConfig::default())
    }
}

impl QueryExecutor {
    #[must_use]
    pub fn new(config: QueryConfig) -> Self {
        Self { config, resolver: Arc::new(StandardResolver), cancel: CancelToken::new() }
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Evaluates `query` over every collection and merges the matches.
    ///
    /// All tasks settle before anything is returned. If any collection
    /// failed, the failure of the earliest such collection is returned and
    /// no rows are.
    ///
    /// # Errors
    /// Compile errors before any task starts, `Cancelled`, or
    /// `CollectionFailed` wrapping the task's own error.
    pub async fn execute(
        &self,
        query: &Query,
        collections: &[Arc<CollectionRecords>],
    ) -> Result<ResultSet, QueryError> {
        let start = Instant::now();
        let outcome = self.run(query, collections).await;
        let duration_ms = start.elapsed().as_millis();
        let (count, failed) = match &outcome {
            Ok(rs) => (rs.len(), false),
            Err(e) => {
                log::warn!("query over {} collection(s) failed: {e}", collections.len());
                (0, true)
            }
        };
        telemetry::log_query(
            collections.len(),
            query.conditions().len() / 2,
            duration_ms,
            count,
            failed,
            self.config.slow_query_ms,
        );
        crate::dev6!(
            "{{\"bench\":\"query\",\"op\":\"execute\",\"collections\":{},\"duration_ms\":{},\"result_count\":{},\"failed\":{}}}",
            usize_to_u64(collections.len()),
            u128_to_u64_saturating(duration_ms),
            usize_to_u64(count),
            failed
        );
        outcome
    }

    async fn run(&self, query: &Query, collections: &[Arc<CollectionRecords>]) -> Result<ResultSet, QueryError> {
        let plan = Arc::new(QueryPlan::compile(query, &self.config)?);
        if self.cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        log::debug!("executing {} step(s) over {} collection(s)", plan.len(), collections.len());

        let permits = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut handles = Vec::with_capacity(collections.len());
        for records in collections {
            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|e| QueryError::Task(e.to_string()))?;
            let plan = Arc::clone(&plan);
            let records = Arc::clone(records);
            let resolver = Arc::clone(&self.resolver);
            let cancel = self.cancel.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                execute_collection(&plan, &records, resolver.as_ref(), &cancel)
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await);
        }
        if self.cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }

        let mut matched = Vec::with_capacity(outcomes.len());
        for (records, outcome) in collections.iter().zip(outcomes) {
            let failure = match outcome {
                Ok(Ok(rows)) => {
                    matched.push(rows);
                    continue;
                }
                Ok(Err(e)) => e,
                Err(join) => QueryError::Task(join.to_string()),
            };
            return Err(QueryError::CollectionFailed {
                collection: records.bucket().to_string(),
                source: Box::new(failure),
            });
        }

        let mut results = ResultSet::new(plan.is_distinct());
        for rows in matched {
            results.extend(rows);
        }
        Ok(results)
    }
}

/// Runs `query` with the standard resolver.
///
/// # Errors
/// See [`QueryExecutor::execute`].
pub async fn execute_query(
    query: &Query,
    collections: &[Arc<CollectionRecords>],
    config: &QueryConfig,
) -> Result<ResultSet, QueryError> {
    QueryExecutor::new(config.clone()).execute(query, collections).await
}

/// Blocking form of [`execute_query`] for callers without a runtime.
///
/// # Errors
/// `Task` when called from inside a tokio runtime, `Io` if the private
/// runtime cannot start; otherwise see [`QueryExecutor::execute`].
pub fn execute_query_blocking(
    query: &Query,
    collections: &[Arc<CollectionRecords>],
    config: &QueryConfig,
) -> Result<ResultSet, QueryError> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(QueryError::Task(
            "execute_query_blocking called from inside a tokio runtime; use execute_query".to_string(),
        ));
    }
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    rt.block_on(execute_query(query, collections, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryBuilder;
    use crate::records::Observation;

    fn records(bucket: &str, names: &[&str]) -> CollectionRecords {
        let media: Vec<Media> = (0..names.len())
            .map(|i| Media { media_id: format!("m{i}"), file_path: format!("img/{i}.jpg"), ..Default::default() })
            .collect();
        let obs = names
            .iter()
            .enumerate()
            .map(|(i, n)| Observation { media_id: format!("m{i}"), scientific_name: (*n).into(), ..Default::default() })
            .collect();
        CollectionRecords::new(bucket, vec![], media, obs)
    }

    #[test]
    fn compile_rejects_bad_structure() {
        let cfg = QueryConfig::default();
        let q = QueryBuilder::new(false, false).raw_condition(QueryPart::Value, Operator::Equal, "x").build();
        assert!(matches!(QueryPlan::compile(&q, &cfg), Err(QueryError::MalformedCondition(_))));
        let q = QueryBuilder::new(false, false)
            .raw_condition(QueryPart::Attribute, Operator::Equal, "year")
            .build();
        assert!(matches!(QueryPlan::compile(&q, &cfg), Err(QueryError::MalformedCondition(_))));
        let q = QueryBuilder::new(false, false).condition(Attribute::Year, Operator::Equal, "soon").build();
        assert!(matches!(QueryPlan::compile(&q, &cfg), Err(QueryError::MalformedValue { .. })));
        let q = QueryBuilder::new(false, false)
            .raw_condition(QueryPart::Attribute, Operator::Equal, "colour")
            .raw_condition(QueryPart::Value, Operator::Equal, "red")
            .build();
        assert!(matches!(QueryPlan::compile(&q, &cfg), Err(QueryError::UnknownAttribute(_))));
    }

    #[test]
    fn long_lists_hit_the_limit() {
        let cfg = QueryConfig { max_in_values: 2, ..QueryConfig::default() };
        let q = QueryBuilder::new(false, false).months([1, 2, 3]).build();
        assert!(matches!(QueryPlan::compile(&q, &cfg), Err(QueryError::LimitExceeded(_))));
    }

    #[test]
    fn single_collection_narrowing() {
        let rec = records("cam", &["Puma concolor", "Lynx rufus", "Puma concolor"]);
        let q = QueryBuilder::new(false, false).species(["Puma concolor"]).build();
        let plan = QueryPlan::compile(&q, &QueryConfig::default()).unwrap();
        let rows = execute_collection(&plan, &rec, &StandardResolver, &CancelToken::new()).unwrap();
        assert_eq!(rows, vec![ResultRow::new("cam/img/", "0.jpg"), ResultRow::new("cam/img/", "2.jpg")]);
    }

    #[test]
    fn no_conditions_match_everything() {
        let rec = records("cam", &["a", "b"]);
        let q = QueryBuilder::new(false, false).build();
        let plan = QueryPlan::compile(&q, &QueryConfig::default()).unwrap();
        assert!(plan.is_empty());
        let rows = execute_collection(&plan, &rec, &StandardResolver, &CancelToken::new()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn cancelled_before_first_step() {
        let rec = records("cam", &["a"]);
        let q = QueryBuilder::new(false, false).species(["a"]).build();
        let plan = QueryPlan::compile(&q, &QueryConfig::default()).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            execute_collection(&plan, &rec, &StandardResolver, &cancel),
            Err(QueryError::Cancelled)
        ));
    }

    #[test]
    fn blocking_wrapper_runs_without_a_runtime() {
        let rec = Arc::new(records("cam", &["a", "b"]));
        let q = QueryBuilder::new(false, false).species(["b"]).build();
        let rs = execute_query_blocking(&q, &[rec], &QueryConfig::default()).unwrap();
        assert_eq!(rs.len(), 1);
    }

    #[tokio::test]
    async fn blocking_wrapper_refuses_a_running_runtime() {
        let rec = Arc::new(records("cam", &["a"]));
        let q = QueryBuilder::new(false, false).species(["a"]).build();
        let err = execute_query_blocking(&q, &[rec], &QueryConfig::default()).unwrap_err();
        assert!(matches!(err, QueryError::Task(_)));
    }

    #[test]
    fn collection_bench_line_escapes_the_bucket() {
        let rec = records("cam \"north\\1\"", &["a"]);
        let plan = QueryPlan::compile(&QueryBuilder::new(false, false).build(), &QueryConfig::default()).unwrap();
        let cap = crate::utils::devlog::capture();
        execute_collection(&plan, &rec, &StandardResolver, &CancelToken::new()).unwrap();
        let lines = cap.take();
        let line: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(line["collection"], "cam \"north\\1\"");
        assert_eq!(line["matched"], 1);
    }

    #[tokio::test]
    async fn slow_threshold_follows_the_executor_config() {
        let rec = Arc::new(records("cam", &["a"]));
        let q = QueryBuilder::new(false, false).build();
        let before = telemetry::snapshot();
        let exec = QueryExecutor::new(QueryConfig { slow_query_ms: 0, ..QueryConfig::default() });
        exec.execute(&q, &[rec]).await.unwrap();
        assert!(telemetry::snapshot().queries_slow_total > before.queries_slow_total);
    }
}
