use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};

use crate::error::{TemporalError, TemporalResult};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC time truncated to whole seconds, the precision of a SQL
/// `DATETIME` column.
pub fn now_timestamp() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_time(time: &NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a `YYYY-MM-DD` date. A trailing time component is ignored so that
/// `DATETIME` text read from a `DATE` mapped column still decodes.
pub fn parse_date(input: &str) -> TemporalResult<NaiveDate> {
    let trimmed = input.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT).map_err(|source| {
        TemporalError::ParseFailed {
            input: input.to_string(),
            kind: "date",
            source,
        }
    })
}

/// Parses `HH:MM:SS` with optional fractional seconds.
pub fn parse_time(input: &str) -> TemporalResult<NaiveTime> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M:%S%.f").map_err(|source| {
        TemporalError::ParseFailed {
            input: input.to_string(),
            kind: "time",
            source,
        }
    })
}

/// Parses `YYYY-MM-DD HH:MM:SS` or the ISO 8601 `T` separated form, with
/// optional fractional seconds.
pub fn parse_timestamp(input: &str) -> TemporalResult<NaiveDateTime> {
    let trimmed = input.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|source| {
            TemporalError::ParseFailed {
                input: input.to_string(),
                kind: "timestamp",
                source,
            }
        })
}
