use camtrap_query::query::{Attribute, Operator, QueryBuilder, QueryExecutor, telemetry};
use camtrap_query::records::parse_timestamp;
use camtrap_query::{CollectionRecords, CsvOptions, QueryConfig, QueryError, load_collection_dir, logger};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "camquery", version, about = "Query camera-trap collection metadata", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). If omitted, the usual locations are searched.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Write rolling log files to this directory")]
    log_dir: Option<PathBuf>,
    #[arg(long, help = "Log level: error|warn|info|debug|trace")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Find media files matching the given filters")]
    Query(QueryArgs),
    #[command(about = "List the operator vocabulary")]
    Operators,
    #[command(about = "List the attributes a condition can name")]
    Attributes,
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    #[arg(required = true, help = "Collection folders as DIR or DIR=BUCKET; BUCKET defaults to the folder name")]
    collections: Vec<String>,
    #[arg(long, value_delimiter = ',', help = "Scientific names (comma-separated)")]
    species: Vec<String>,
    #[arg(long = "location", value_delimiter = ',', help = "Location ids (comma-separated)")]
    locations: Vec<String>,
    #[arg(long = "collection-id", value_delimiter = ',', help = "Collection ids (comma-separated)")]
    collection_ids: Vec<String>,
    #[arg(long, help = "First year, inclusive")]
    year_from: Option<i32>,
    #[arg(long, help = "Last year, inclusive")]
    year_to: Option<i32>,
    #[arg(long = "month", value_delimiter = ',', help = "Months 1-12")]
    months: Vec<u32>,
    #[arg(long = "hour", value_delimiter = ',', help = "Hours 0-23")]
    hours: Vec<u32>,
    #[arg(long = "day", value_delimiter = ',', help = "Days of week, Monday = 1")]
    days: Vec<u32>,
    #[arg(long, value_parser = parse_date_arg, help = "Taken after (YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS])")]
    start: Option<NaiveDateTime>,
    #[arg(long, value_parser = parse_date_arg, help = "Taken before (YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS])")]
    end: Option<NaiveDateTime>,
    #[arg(long, allow_hyphen_values = true, help = "Elevation to compare against")]
    elevation: Option<f64>,
    #[arg(long, default_value = "=", requires = "elevation", help = "Elevation operator, e.g. '>=' or GREATER_THAN")]
    elevation_op: String,
    #[arg(long, help = "Drop repeated (path, name) results")]
    distinct: bool,
    #[arg(long, help = "Compare strings ignoring case")]
    case_insensitive: bool,
    #[arg(long, help = "Skip CSV rows that fail to parse")]
    skip_errors: bool,
    #[arg(long, help = "Collections evaluated at once (overrides config)")]
    max_concurrency: Option<usize>,
    #[arg(long, help = "Print results as a JSON array")]
    json: bool,
    #[arg(long, help = "Print counters after the query")]
    metrics: bool,
}

fn parse_date_arg(s: &str) -> Result<NaiveDateTime, String> {
    if let Some(t) = parse_timestamp(s) {
        return Ok(t);
    }
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("invalid date '{s}'"))
}

fn find_config_paths(cli_cfg: Option<&Path>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = vec![];
    if let Some(p) = cli_cfg {
        paths.push(p.to_path_buf());
    }
    if let Ok(p) = std::env::var("CAMTRAP_QUERY_CONFIG") {
        paths.push(PathBuf::from(p));
    }
    if let Some(home) = dirs_next::home_dir() {
        paths.push(home.join(".config").join("camquery.toml"));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join("camquery.toml"));
    }
    paths
}

fn load_config(cli_cfg: Option<&Path>) -> Result<QueryConfig, QueryError> {
    // Precedence: CLI > env > config file > defaults
    let mut cfg = QueryConfig::default();
    if let Some(explicit) = cli_cfg
        && !explicit.is_file()
    {
        return Err(QueryError::Config(format!("config file not found: {}", explicit.display())));
    }
    if let Some(path) = find_config_paths(cli_cfg).into_iter().find(|p| p.is_file()) {
        log::debug!("using config {}", path.display());
        cfg = QueryConfig::load(&path)?;
    }
    Ok(cfg.apply_env())
}

fn split_collection_arg(arg: &str) -> (PathBuf, String) {
    if let Some((dir, bucket)) = arg.split_once('=')
        && !bucket.is_empty()
    {
        return (PathBuf::from(dir), bucket.to_string());
    }
    let dir = PathBuf::from(arg);
    let bucket = dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| arg.to_string());
    (dir, bucket)
}

fn build_query(args: &QueryArgs) -> Result<camtrap_query::Query, QueryError> {
    let mut b = QueryBuilder::new(args.distinct, args.case_insensitive)
        .species(&args.species)
        .locations(&args.locations)
        .collections(&args.collection_ids)
        .months(args.months.iter().copied())
        .hours(args.hours.iter().copied())
        .days_of_week(args.days.iter().copied());
    b = match (args.year_from, args.year_to) {
        (Some(from), Some(to)) => b.year_range(from, to),
        (Some(from), None) => b.condition(Attribute::Year, Operator::GreaterThanOrEqualTo, from.to_string()),
        (None, Some(to)) => b.condition(Attribute::Year, Operator::LessThanOrEqualTo, to.to_string()),
        (None, None) => b,
    };
    if let Some(start) = args.start {
        b = b.start_date(start);
    }
    if let Some(end) = args.end {
        b = b.end_date(end);
    }
    if let Some(elevation) = args.elevation {
        b = b.elevation(elevation, args.elevation_op.parse::<Operator>()?);
    }
    Ok(b.build())
}

async fn run_query(args: QueryArgs, mut cfg: QueryConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(n) = args.max_concurrency {
        cfg.max_concurrency = n;
    }
    cfg.validate()?;
    let query = build_query(&args)?;

    let opts = CsvOptions { skip_errors: args.skip_errors, ..CsvOptions::default() };
    let mut collections: Vec<Arc<CollectionRecords>> = Vec::with_capacity(args.collections.len());
    for arg in &args.collections {
        let (dir, bucket) = split_collection_arg(arg);
        let (records, report) = load_collection_dir(&bucket, &dir, &opts)?;
        if report.skipped > 0 {
            eprintln!("warning: {bucket}: skipped {} malformed row(s)", report.skipped);
        }
        collections.push(Arc::new(records));
    }

    let results = QueryExecutor::new(cfg).execute(&query, &collections).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(results.rows())?);
    } else {
        for row in &results {
            println!("{}", row.full_path());
        }
        eprintln!("{} result(s)", results.len());
    }
    if args.metrics {
        eprint!("{}", telemetry::metrics_text());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let logged = if cli.log_dir.is_some() || cli.log_level.is_some() {
        logger::configure_logging(cli.log_dir.as_deref(), cli.log_level.as_deref(), None)
    } else {
        logger::configure_from_env()
    };
    if let Err(e) = logged {
        eprintln!("warning: logging disabled: {e}");
    }

    let r: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Commands::Operators => {
            for op in Operator::ALL {
                println!("{:<12} {}", op.symbol(), op.name());
            }
            Ok(())
        }
        Commands::Attributes => {
            for attr in Attribute::ALL {
                println!("{:<15} {}", attr.name(), attr.kind());
            }
            Ok(())
        }
        Commands::Query(args) => match load_config(cli.config.as_deref()) {
            Ok(cfg) => run_query(args, cfg).await,
            Err(e) => Err(e.into()),
        },
    };
    match r {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
