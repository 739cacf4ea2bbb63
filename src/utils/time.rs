//! Wall-clock to local-zone conversion shared by stored timestamps and
//! query values.

use chrono::{DateTime, Duration, Local, LocalResult, NaiveDateTime, TimeZone};

/// Reads `t` as a wall-clock time in the local zone.
///
/// An ambiguous time (clocks set back) takes the earlier instant. A time
/// skipped by clocks going forward keeps the offset in force before the
/// jump, so 02:30 on a one-hour spring-forward day lands on 03:30.
#[must_use]
pub fn local_from_naive(t: NaiveDateTime) -> DateTime<Local> {
    match Local.from_local_datetime(&t) {
        LocalResult::Single(d) | LocalResult::Ambiguous(d, _) => d,
        LocalResult::None => across_gap(t),
    }
}

fn across_gap(t: NaiveDateTime) -> DateTime<Local> {
    let before = t
        .checked_sub_signed(Duration::hours(6))
        .and_then(|b| Local.from_local_datetime(&b).earliest());
    let offset = before.map_or(0, |d| d.offset().local_minus_utc());
    let utc = t.checked_sub_signed(Duration::seconds(i64::from(offset))).unwrap_or(t);
    Local.from_utc_datetime(&utc)
}
