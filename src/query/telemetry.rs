use std::sync::atomic::{AtomicU64, Ordering};

pub const METRICS_TARGET: &str = "camtrap_query::metrics";

#[derive(Default)]
pub struct Metrics {
    pub queries_total: AtomicU64,
    pub queries_failed_total: AtomicU64,
    pub queries_slow_total: AtomicU64,
    pub collections_scanned_total: AtomicU64,
    pub conditions_evaluated_total: AtomicU64,
    pub rows_matched_total: AtomicU64,
}

#[derive(Default)]
pub struct Telemetry {
    pub metrics: Metrics,
}

pub(crate) static TELEMETRY: std::sync::LazyLock<Telemetry> =
    std::sync::LazyLock::new(Telemetry::default);

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queries_total: u64,
    pub queries_failed_total: u64,
    pub queries_slow_total: u64,
    pub collections_scanned_total: u64,
    pub conditions_evaluated_total: u64,
    pub rows_matched_total: u64,
}

pub(crate) fn record_collection(conditions_evaluated: u64, rows_matched: u64) {
    let m = &TELEMETRY.metrics;
    m.collections_scanned_total.fetch_add(1, Ordering::Relaxed);
    m.conditions_evaluated_total.fetch_add(conditions_evaluated, Ordering::Relaxed);
    m.rows_matched_total.fetch_add(rows_matched, Ordering::Relaxed);
}

/// Counts a finished query and logs it to the metrics target. Queries at or
/// above `slow_query_ms` are logged at `warn`.
pub fn log_query(
    collections: usize,
    conditions: usize,
    duration_ms: u128,
    result_count: usize,
    failed: bool,
    slow_query_ms: u64,
) {
    let m = &TELEMETRY.metrics;
    m.queries_total.fetch_add(1, Ordering::Relaxed);
    if failed {
        m.queries_failed_total.fetch_add(1, Ordering::Relaxed);
    }
    let slow = match u64::try_from(duration_ms) {
        Ok(ms) => ms >= slow_query_ms,
        Err(_) => true,
    };
    if slow {
        m.queries_slow_total.fetch_add(1, Ordering::Relaxed);
    }
    let line = serde_json::json!({
        "ts": now_ts(),
        "collections": collections,
        "conditions": conditions,
        "duration_ms": u64::try_from(duration_ms).unwrap_or(u64::MAX),
        "result_count": result_count,
        "failed": failed,
        "slow": slow
    })
    .to_string();
    if slow {
        log::warn!(target: METRICS_TARGET, "{line}");
    } else {
        log::info!(target: METRICS_TARGET, "{line}");
    }
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[must_use]
pub fn snapshot() -> MetricsSnapshot {
    let m = &TELEMETRY.metrics;
    MetricsSnapshot {
        queries_total: m.queries_total.load(Ordering::Relaxed),
        queries_failed_total: m.queries_failed_total.load(Ordering::Relaxed),
        queries_slow_total: m.queries_slow_total.load(Ordering::Relaxed),
        collections_scanned_total: m.collections_scanned_total.load(Ordering::Relaxed),
        conditions_evaluated_total: m.conditions_evaluated_total.load(Ordering::Relaxed),
        rows_matched_total: m.rows_matched_total.load(Ordering::Relaxed),
    }
}

#[must_use]
pub fn metrics_text() -> String {
    // OpenMetrics/Prometheus exposition format (no types/HELP for brevity)
    let s = snapshot();
    format!(
        "camtrap_queries_total {}\n\
         camtrap_queries_failed_total {}\n\
         camtrap_queries_slow_total {}\n\
         camtrap_collections_scanned_total {}\n\
         camtrap_conditions_evaluated_total {}\n\
         camtrap_rows_matched_total {}\n",
        s.queries_total,
        s.queries_failed_total,
        s.queries_slow_total,
        s.collections_scanned_total,
        s.conditions_evaluated_total,
        s.rows_matched_total,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // Counters are process-wide, so only assert that they move forward.
    #[test]
    fn counters_are_monotonic() {
        let before = snapshot();
        record_collection(3, 2);
        log_query(1, 3, 1, 2, false, 500);
        log_query(1, 3, 1, 0, true, 500);
        let after = snapshot();
        assert!(after.queries_total >= before.queries_total + 2);
        assert!(after.queries_failed_total > before.queries_failed_total);
        assert!(after.conditions_evaluated_total >= before.conditions_evaluated_total + 3);
        assert!(after.rows_matched_total >= before.rows_matched_total + 2);
    }

    #[test]
    fn threshold_comes_from_the_caller() {
        let before = snapshot();
        log_query(1, 1, 0, 0, false, 0);
        assert!(snapshot().queries_slow_total > before.queries_slow_total);
    }

    #[test]
    fn metrics_text_lists_every_counter() {
        let text = metrics_text();
        for name in [
            "camtrap_queries_total",
            "camtrap_queries_failed_total",
            "camtrap_queries_slow_total",
            "camtrap_collections_scanned_total",
            "camtrap_conditions_evaluated_total",
            "camtrap_rows_matched_total",
        ] {
            assert!(text.contains(name), "{name}");
        }
    }
}
