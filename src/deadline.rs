//! Deadline gate: parsing of admin-entered deadlines and the closed check.
//!
//! Admin input that parses in no accepted format is a hard error. The
//! one-hour-from-now default survives only for data loaded from old
//! snapshots, and is logged so the masking is visible.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized deadline format: {0:?}")]
pub struct DeadlineError(pub String);

const FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Accepts RFC 3339, a few `YYYY-MM-DD[ HH:MM[:SS]]` variants, and a bare
/// date (meaning midnight UTC). Naive inputs are taken as UTC.
pub fn parse_deadline(input: &str) -> Result<DateTime<Utc>, DeadlineError> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }
    Err(DeadlineError(input.to_owned()))
}

pub fn parse_deadline_or_default(input: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    match parse_deadline(input) {
        Ok(deadline) => deadline,
        Err(err) => {
            warn!(%err, "falling back to a deadline one hour from now");
            now + Duration::hours(1)
        }
    }
}

pub fn is_closed(deadline: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > deadline
}

/// Serde glue for loading snapshots written by older iterations of the
/// tool, which stored deadlines as free-text strings.
pub fn lenient_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(parse_deadline_or_default(&raw, Utc::now()))
}

/// Serde default for snapshots missing the deadline field entirely.
pub fn one_hour_from_now() -> DateTime<Utc> {
    warn!("snapshot project has no deadline, defaulting to one hour from now");
    Utc::now() + Duration::hours(1)
}
