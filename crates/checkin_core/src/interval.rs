use chrono::{DateTime, Days, Duration, LocalResult, Months, NaiveDateTime, TimeZone};

use crate::model::FrequencyUnit;

/// Moves `date` forward by `value` units on the calendar of its own time zone.
///
/// Month steps keep the day of month and clamp to the last day when the target
/// month is shorter, so Jan 31 + 1 month lands on Feb 28 (or 29), never in March.
/// Returns `None` when the result is not representable.
pub fn advance<Tz: TimeZone>(
    date: &DateTime<Tz>,
    value: u32,
    unit: FrequencyUnit,
) -> Option<DateTime<Tz>> {
    let local = date.naive_local();
    let shifted = match unit {
        FrequencyUnit::Days => local.checked_add_days(Days::new(u64::from(value)))?,
        FrequencyUnit::Weeks => local.checked_add_days(Days::new(u64::from(value) * 7))?,
        FrequencyUnit::Months => local.checked_add_months(Months::new(value))?,
    };
    resolve_local(&date.timezone(), shifted)
}

// Wall-clock times skipped by a DST transition resolve to the first valid
// instant after the gap.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => {
            let after_gap = naive.checked_add_signed(Duration::hours(1))?;
            tz.from_local_datetime(&after_gap).earliest()
        }
    }
}
