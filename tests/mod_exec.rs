use camtrap_query::errors::QueryError;
use camtrap_query::query::{
    Attribute, CancelToken, FieldValue, Operator, QueryBuilder, QueryExecutor, QueryPart, QueryPlan, Resolver,
    ResultRow, StandardResolver, execute_collection, execute_query,
};
use camtrap_query::records::{CollectionRecords, Deployment, Media, Observation};
use camtrap_query::{QueryConfig, utils::devlog};
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::sync::Arc;

fn ts(y: i32, m: u32, d: u32, h: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
}

fn media(id: &str, dep: &str, path: &str) -> Media {
    Media { media_id: id.into(), deployment_id: Some(dep.into()), file_path: path.into(), ..Default::default() }
}

fn observation(media_id: &str, dep: &str, species: &str, when: chrono::NaiveDateTime) -> Observation {
    Observation {
        media_id: media_id.into(),
        deployment_id: Some(dep.into()),
        scientific_name: species.into(),
        count: Some(1),
        timestamp: Some(when),
        ..Default::default()
    }
}

fn deployment(id: &str, location: &str, lat: f64, lon: f64) -> Deployment {
    Deployment {
        deployment_id: Some(id.into()),
        location_id: location.into(),
        location_name: format!("{location} ridge"),
        latitude: Some(lat),
        longitude: Some(lon),
        camera_height: Some(1500.0),
        ..Default::default()
    }
}

/// Collection A: m1 is a puma in 2021, m2 a bobcat in 2020, m3 has no observation.
fn collection_a() -> CollectionRecords {
    CollectionRecords::new(
        "bucket-a",
        vec![deployment("dep1", "loc-1", 32.27, -110.84)],
        vec![
            media("m1", "dep1", "site1/IMG_0001.JPG"),
            media("m2", "dep1", "site1/IMG_0002.JPG"),
            media("m3", "dep1", "site1/IMG_0003.JPG"),
        ],
        vec![
            observation("m1", "dep1", "Puma concolor", ts(2021, 3, 1, 8)),
            observation("m2", "dep1", "Lynx rufus", ts(2020, 7, 4, 22)),
        ],
    )
}

fn single_file_collection(bucket: &str, species: &str) -> CollectionRecords {
    CollectionRecords::new(
        bucket,
        vec![deployment("d", "loc", 31.0, -111.0)],
        vec![media("m1", "d", "shared/IMG_1.JPG")],
        vec![observation("m1", "d", species, ts(2022, 1, 1, 12))],
    )
}

#[derive(Default)]
struct CountingResolver {
    calls: Mutex<Vec<Attribute>>,
}

impl CountingResolver {
    fn count(&self, attribute: Attribute) -> usize {
        self.calls.lock().iter().filter(|a| **a == attribute).count()
    }
}

impl Resolver for CountingResolver {
    fn resolve(
        &self,
        attribute: Attribute,
        media: &Media,
        records: &CollectionRecords,
    ) -> Result<Option<FieldValue>, QueryError> {
        self.calls.lock().push(attribute);
        StandardResolver.resolve(attribute, media, records)
    }
}

/// Fails every lookup inside the named buckets.
struct FailingResolver {
    buckets: Vec<&'static str>,
}

impl Resolver for FailingResolver {
    fn resolve(
        &self,
        attribute: Attribute,
        media: &Media,
        records: &CollectionRecords,
    ) -> Result<Option<FieldValue>, QueryError> {
        if self.buckets.iter().any(|b| *b == records.bucket()) {
            return Err(QueryError::Task(format!("backend down for {}", records.bucket())));
        }
        StandardResolver.resolve(attribute, media, records)
    }
}

#[tokio::test]
async fn puma_in_2021_end_to_end() {
    let q = QueryBuilder::new(false, false)
        .species(["Puma concolor"])
        .condition(Attribute::Year, Operator::Equal, "2021")
        .build();
    let rs = execute_query(&q, &[Arc::new(collection_a())], &QueryConfig::default()).await.unwrap();
    assert_eq!(rs.rows(), &[ResultRow::new("bucket-a/site1/", "IMG_0001.JPG")]);
}

#[tokio::test]
async fn distinct_merges_identical_rows_across_collections() {
    let collections = [
        Arc::new(single_file_collection("same", "Canis latrans")),
        Arc::new(single_file_collection("same", "Canis latrans")),
    ];
    let distinct = QueryBuilder::new(true, false).species(["Canis latrans"]).build();
    let all = QueryBuilder::new(false, false).species(["Canis latrans"]).build();
    let cfg = QueryConfig::default();
    assert_eq!(execute_query(&distinct, &collections, &cfg).await.unwrap().len(), 1);
    assert_eq!(execute_query(&all, &collections, &cfg).await.unwrap().len(), 2);
}

#[tokio::test]
async fn merge_follows_collection_order() {
    let collections: Vec<Arc<CollectionRecords>> =
        ["c0", "c1", "c2", "c3", "c4"].iter().map(|b| Arc::new(single_file_collection(b, "Odocoileus"))).collect();
    let cfg = QueryConfig { max_concurrency: 2, ..QueryConfig::default() };
    let rs = execute_query(&QueryBuilder::new(true, false).build(), &collections, &cfg).await.unwrap();
    let buckets: Vec<&str> = rs.iter().map(|r| r.path.split('/').next().unwrap()).collect();
    assert_eq!(buckets, vec!["c0", "c1", "c2", "c3", "c4"]);
}

#[test]
fn empty_candidate_set_skips_remaining_conditions() {
    let q = QueryBuilder::new(false, false)
        .species(["Panthera onca"])
        .condition(Attribute::Year, Operator::Equal, "2021")
        .locations(["loc-1"])
        .build();
    let plan = QueryPlan::compile(&q, &QueryConfig::default()).unwrap();
    let resolver = CountingResolver::default();
    let rows = execute_collection(&plan, &collection_a(), &resolver, &CancelToken::new()).unwrap();
    assert!(rows.is_empty());
    assert_eq!(resolver.count(Attribute::ScientificName), 3);
    assert_eq!(resolver.count(Attribute::Year), 0);
    assert_eq!(resolver.count(Attribute::LocationId), 0);
}

#[test]
fn later_conditions_only_see_survivors() {
    let q = QueryBuilder::new(false, false)
        .species(["Puma concolor"])
        .condition(Attribute::Year, Operator::Equal, "2021")
        .build();
    let plan = QueryPlan::compile(&q, &QueryConfig::default()).unwrap();
    let resolver = CountingResolver::default();
    let rows = execute_collection(&plan, &collection_a(), &resolver, &CancelToken::new()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(resolver.count(Attribute::Year), 1);
}

#[tokio::test]
async fn absent_rows_are_excluded_even_by_negations() {
    let q = QueryBuilder::new(false, false)
        .condition(Attribute::ScientificName, Operator::NotEqual, "Ursus arctos")
        .build();
    let rs = execute_query(&q, &[Arc::new(collection_a())], &QueryConfig::default()).await.unwrap();
    let names: Vec<&str> = rs.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["IMG_0001.JPG", "IMG_0002.JPG"]);
}

#[tokio::test]
async fn case_insensitive_species() {
    let rec = [Arc::new(single_file_collection("b", "Vulpes Vulpes"))];
    let cfg = QueryConfig::default();
    let ci = QueryBuilder::new(false, true).species(["vulpes vulpes"]).build();
    let cs = QueryBuilder::new(false, false).species(["vulpes vulpes"]).build();
    assert_eq!(execute_query(&ci, &rec, &cfg).await.unwrap().len(), 1);
    assert!(execute_query(&cs, &rec, &cfg).await.unwrap().is_empty());
}

#[tokio::test]
async fn latitude_between_is_inclusive() {
    let rec = [Arc::new(CollectionRecords::new(
        "b",
        vec![deployment("d", "loc", 32.0, -110.0)],
        vec![media("m1", "d", "x/1.jpg")],
        vec![observation("m1", "d", "Puma concolor", ts(2021, 1, 1, 0))],
    ))];
    let cfg = QueryConfig::default();
    for range in ["(30.0,32.0)", "(32.0,34.0)"] {
        let q = QueryBuilder::new(false, false).condition(Attribute::Latitude, Operator::Between, range).build();
        assert_eq!(execute_query(&q, &rec, &cfg).await.unwrap().len(), 1, "{range}");
    }
}

#[tokio::test]
async fn date_hour_and_elevation_filters() {
    let rec = [Arc::new(collection_a())];
    let cfg = QueryConfig::default();
    let q = QueryBuilder::new(false, false)
        .start_date(ts(2020, 1, 1, 0))
        .end_date(ts(2020, 12, 31, 0))
        .hours([22])
        .elevation(1000.0, Operator::GreaterThan)
        .build();
    let rs = execute_query(&q, &rec, &cfg).await.unwrap();
    assert_eq!(rs.rows(), &[ResultRow::new("bucket-a/site1/", "IMG_0002.JPG")]);
}

#[tokio::test]
async fn first_failing_collection_is_reported() {
    let collections = [
        Arc::new(single_file_collection("ok-1", "a")),
        Arc::new(single_file_collection("bad-1", "a")),
        Arc::new(single_file_collection("bad-2", "a")),
    ];
    let exec = QueryExecutor::new(QueryConfig::default())
        .with_resolver(Arc::new(FailingResolver { buckets: vec!["bad-2", "bad-1"] }));
    let q = QueryBuilder::new(false, false).species(["a"]).build();
    match exec.execute(&q, &collections).await {
        Err(QueryError::CollectionFailed { collection, source }) => {
            assert_eq!(collection, "bad-1");
            assert!(matches!(*source, QueryError::Task(_)));
        }
        other => panic!("expected a collection failure, got {other:?}"),
    }
}

#[tokio::test]
async fn compile_errors_fail_before_any_lookup() {
    let resolver = Arc::new(CountingResolver::default());
    let exec = QueryExecutor::new(QueryConfig::default()).with_resolver(resolver.clone());
    let q = QueryBuilder::new(false, false)
        .species(["Puma concolor"])
        .condition(Attribute::Count, Operator::Equal, "several")
        .build();
    let err = exec.execute(&q, &[Arc::new(collection_a())]).await.unwrap_err();
    assert!(matches!(err, QueryError::MalformedValue { .. }));
    assert_eq!(resolver.calls.lock().len(), 0);

    let dangling = QueryBuilder::new(false, false)
        .species(["Puma concolor"])
        .raw_condition(QueryPart::Attribute, Operator::Equal, "year")
        .build();
    let err = exec.execute(&dangling, &[Arc::new(collection_a())]).await.unwrap_err();
    assert!(matches!(err, QueryError::MalformedCondition(_)));
}

#[tokio::test]
async fn cancelled_query_returns_cancelled() {
    let cancel = CancelToken::new();
    let exec = QueryExecutor::new(QueryConfig::default()).with_cancel_token(cancel.clone());
    cancel.cancel();
    let q = QueryBuilder::new(false, false).species(["Puma concolor"]).build();
    let err = exec.execute(&q, &[Arc::new(collection_a())]).await.unwrap_err();
    assert!(matches!(err, QueryError::Cancelled));
    assert!(exec.cancel_token().is_cancelled());
}

#[tokio::test]
async fn no_collections_no_results() {
    let q = QueryBuilder::new(true, false).species(["Puma concolor"]).build();
    assert!(execute_query(&q, &[], &QueryConfig::default()).await.unwrap().is_empty());
}

#[test]
fn collection_bench_line_is_emitted() {
    let cap = devlog::capture();
    let q = QueryBuilder::new(false, false).species(["Puma concolor"]).build();
    let plan = QueryPlan::compile(&q, &QueryConfig::default()).unwrap();
    execute_collection(&plan, &collection_a(), &StandardResolver, &CancelToken::new()).unwrap();
    let lines = cap.take();
    assert_eq!(lines.len(), 1);
    let v: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(v["op"], "collection");
    assert_eq!(v["collection"], "bucket-a");
    assert_eq!(v["matched"], 1);
}
