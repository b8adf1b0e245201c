//! Single source of truth for the local calendar day.
//!
//! Every component that branches on a date boundary (progress rollover,
//! streak crediting, the midnight scheduler) goes through this module, so
//! day-boundary logic is defined once and tested once.

use chrono::{Duration, Local, NaiveDateTime, NaiveTime};

/// Storage format for local dates, e.g. "2024-03-11".
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Seconds past midnight before the rollover timer fires.
const ROLLOVER_GRACE_SECS: i64 = 2;

/// Lower bound for the rollover delay.
const MIN_DELAY_MS: i64 = 1000;

/// Today's local calendar date as a storage key.
pub fn today() -> String {
  Local::now().date_naive().format(DATE_FORMAT).to_string()
}

/// The calendar day before `day`, crossing month and year boundaries.
///
/// Returns `None` when `day` is not a valid stored date.
pub fn yesterday_of(day: &str) -> Option<String> {
  let date = chrono::NaiveDate::parse_from_str(day, DATE_FORMAT).ok()?;
  date
    .pred_opt()
    .map(|d| d.format(DATE_FORMAT).to_string())
}

/// Delay until shortly after the next local midnight.
pub fn delay_until_rollover() -> std::time::Duration {
  rollover_delay_from(Local::now().naive_local())
}

/// Delay from `now` until the next midnight plus a small grace period,
/// never less than one second.
fn rollover_delay_from(now: NaiveDateTime) -> std::time::Duration {
  let next = now
    .date()
    .succ_opt()
    .unwrap_or(now.date())
    .and_time(NaiveTime::MIN)
    + Duration::seconds(ROLLOVER_GRACE_SECS);
  let millis = (next - now).num_milliseconds().max(MIN_DELAY_MS);
  std::time::Duration::from_millis(millis as u64)
}
