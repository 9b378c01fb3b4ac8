//! Parsing of the streaming host's bracketed log timestamps
//!
//! Lines start with `[YYYY-MM-DD HH:MM:SS.mmm]` in local time.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use thiserror::Error;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("log line missing timestamp brackets")]
    MissingBrackets,
    #[error("invalid timestamp '{value}': {reason}")]
    Invalid { value: String, reason: String },
    #[error("timestamp '{0}' does not exist in the local time zone")]
    Nonexistent(String),
}

/// Parse the leading bracketed timestamp of a log line
pub fn parse_log_timestamp(line: &str) -> Result<DateTime<Local>, TimestampError> {
    let rest = line
        .strip_prefix('[')
        .ok_or(TimestampError::MissingBrackets)?;
    let end = rest.find(']').ok_or(TimestampError::MissingBrackets)?;
    let value = &rest[..end];

    let naive = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|e| {
        TimestampError::Invalid {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })?;

    // Ambiguous wall-clock times during a DST fold resolve to the earlier
    // instant, matching a log that was written before the clock moved back.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| TimestampError::Nonexistent(value.to_string()))
}
