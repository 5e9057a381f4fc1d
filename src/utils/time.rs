//! Timestamp encoding for stored documents
//!
//! The document store keeps numbers as IEEE doubles, so a full tick count
//! (100 ns units since 0001-01-01) does not survive a round trip. A point in
//! time is therefore stored as three parts:
//!
//! - `date`: the calendar day as `YYYYMMDD`
//! - `ticks`: ticks elapsed since midnight of that day (always < 2^53)
//! - `totalTicks`: the full tick count as a decimal string
//!
//! Range comparisons inside the store use `date` then `ticks`. Decoding uses
//! only `totalTicks`.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of ticks in one second (one tick is 100 ns)
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Number of ticks in one day
pub const TICKS_PER_DAY: i64 = TICKS_PER_SECOND * 86_400;

const NANOS_PER_TICK: u32 = 100;

/// Last tick of 9999-12-31
pub const MAX_TOTAL_TICKS: i64 = 3_155_378_975_999_999_999;

/// Errors raised while encoding or decoding timestamps
#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("timestamp {0} is outside the supported range (years 1 to 9999)")]
    OutOfRange(DateTime<Utc>),
    #[error("invalid total ticks value: {0:?}")]
    InvalidTicks(String),
}

/// Store-safe representation of a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeJson {
    /// Calendar day as `YYYYMMDD`
    pub date: i32,
    /// Ticks since midnight of `date`
    pub ticks: i64,
    /// Full tick count since 0001-01-01T00:00:00Z, as a decimal string
    pub total_ticks: String,
}

impl DateTimeJson {
    /// Encode a point in time
    ///
    /// Sub-tick precision (below 100 ns) is dropped; use [`truncate_to_ticks`]
    /// beforehand when an exact round trip matters.
    pub fn from_datetime(value: &DateTime<Utc>) -> Result<Self, TimestampError> {
        let date = value.date_naive();
        if !(1..=9999).contains(&date.year()) {
            return Err(TimestampError::OutOfRange(*value));
        }

        let ticks = i64::from(value.num_seconds_from_midnight()) * TICKS_PER_SECOND
            + i64::from(value.nanosecond() / NANOS_PER_TICK);

        // 0001-01-01 is day 1 from the common era
        let days = i64::from(date.num_days_from_ce() - 1);
        let total = days * TICKS_PER_DAY + ticks;

        Ok(Self {
            date: date_bucket(&date),
            ticks,
            total_ticks: total.to_string(),
        })
    }

    /// Decode back into a point in time, using `totalTicks` only
    pub fn to_datetime(&self) -> Result<DateTime<Utc>, TimestampError> {
        let invalid = || TimestampError::InvalidTicks(self.total_ticks.clone());

        let total: i64 = self.total_ticks.trim().parse().map_err(|_| invalid())?;
        if total < 0 {
            return Err(invalid());
        }

        let days = i32::try_from(total / TICKS_PER_DAY).map_err(|_| invalid())?;
        let in_day = total % TICKS_PER_DAY;

        let date = NaiveDate::from_num_days_from_ce_opt(days + 1).ok_or_else(invalid)?;
        let secs = (in_day / TICKS_PER_SECOND) as u32;
        let nanos = (in_day % TICKS_PER_SECOND) as u32 * NANOS_PER_TICK;
        let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).ok_or_else(invalid)?;

        Ok(Utc.from_utc_datetime(&NaiveDateTime::new(date, time)))
    }

    /// Full tick count, if `totalTicks` is well formed
    pub fn total_ticks(&self) -> Option<i64> {
        self.total_ticks.trim().parse().ok()
    }
}

/// Drop precision below one tick so the value survives encoding exactly
pub fn truncate_to_ticks(value: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = value.nanosecond() / NANOS_PER_TICK * NANOS_PER_TICK;
    value.with_nanosecond(nanos).unwrap_or(value)
}

/// Whether `value` stands for "no bound" rather than a real instant
///
/// Instants outside years 1 to 9999 cannot be stored, and the first and last
/// tick of that range are the conventional "unset" markers.
pub fn is_unbounded(value: &DateTime<Utc>) -> bool {
    if !(1..=9999).contains(&value.year()) {
        return true;
    }
    matches!(
        DateTimeJson::from_datetime(value).map(|json| json.total_ticks()),
        Ok(Some(0)) | Ok(Some(MAX_TOTAL_TICKS))
    )
}

fn date_bucket(date: &NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}
