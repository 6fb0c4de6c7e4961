//! Date utilities for daily reset hour handling.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};

/// Get the study day `now` belongs to, based on `daily_reset_hour` (UTC).
///
/// Before the reset hour, the study day is still the previous calendar day,
/// so a late-night session counts towards the day it started in.
pub fn study_day(now: DateTime<Utc>, daily_reset_hour: u32) -> NaiveDate {
    if now.hour() < daily_reset_hour {
        (now - Duration::days(1)).date_naive()
    } else {
        now.date_naive()
    }
}

/// Instant at which the study day containing `now` began.
pub fn study_day_start(now: DateTime<Utc>, daily_reset_hour: u32) -> DateTime<Utc> {
    let hour = NaiveTime::from_hms_opt(daily_reset_hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    study_day(now, daily_reset_hour).and_time(hour).and_utc()
}
