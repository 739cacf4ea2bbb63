use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use crate::query::telemetry::METRICS_TARGET;
use crate::utils::devlog::DEV6_TARGET;

const ENC_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

static HANDLE: Mutex<Option<log4rs::Handle>> = Mutex::new(None);

type LogResult = Result<(), Box<dyn std::error::Error>>;

/// Configure logging globally for the process. Calling it again replaces the
/// active configuration.
/// - dir: base directory for logs; if None, current directory.
/// - level: error|warn|info|debug|trace
/// - retention: number of rolled files to keep (default 7)
///
/// # Errors
/// Returns an error if the directory cannot be created or an appender fails to build.
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, retention: Option<u32>) -> LogResult {
    configure_with_dev6(dir, level, retention, false)
}

/// Like [`configure_logging`], additionally persisting `dev6!` lines to
/// `dev6.log` when `enable_dev6` is set.
///
/// # Errors
/// Returns an error if the directory cannot be created or an appender fails to build.
pub fn configure_with_dev6(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
    enable_dev6: bool,
) -> LogResult {
    let base = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&base)?;
    let keep = retention.unwrap_or(7);
    let lvl = parse_level(level);

    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "query", keep)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(&base, "metrics", keep)?)))
        .logger(Logger::builder().appender("metrics").additive(false).build(METRICS_TARGET, lvl));
    if enable_dev6 {
        builder = builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(&base, "dev6", keep)?)))
            .logger(Logger::builder().appender("dev6").additive(false).build(DEV6_TARGET, LevelFilter::Trace));
    } else {
        builder = builder.logger(Logger::builder().additive(false).build(DEV6_TARGET, LevelFilter::Off));
    }
    let config = builder.build(Root::builder().appender("app").build(lvl))?;

    let mut handle = HANDLE.lock();
    match handle.as_ref() {
        Some(h) => h.set_config(config),
        None => *handle = Some(log4rs::init_config(config)?),
    }
    Ok(())
}

/// Configure logging from environment variables if present:
/// - CAMTRAP_QUERY_LOG_DIR
/// - CAMTRAP_QUERY_LOG_LEVEL
/// - CAMTRAP_QUERY_LOG_RETENTION
/// - CAMTRAP_QUERY_DEV6
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> LogResult {
    let dir = std::env::var("CAMTRAP_QUERY_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("CAMTRAP_QUERY_LOG_LEVEL").ok();
    let retention = std::env::var("CAMTRAP_QUERY_LOG_RETENTION").ok().and_then(|s| s.parse::<u32>().ok());
    let dev6_enabled = std::env::var("CAMTRAP_QUERY_DEV6")
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    configure_with_dev6(dir.as_deref(), level.as_deref(), retention, dev6_enabled)
}

fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder().build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(ENC_PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?;
    Ok(appender)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(parse_level(Some("DEBUG")), LevelFilter::Debug);
        assert_eq!(parse_level(Some("bogus")), LevelFilter::Info);
        assert_eq!(parse_level(None), LevelFilter::Info);
    }
}
