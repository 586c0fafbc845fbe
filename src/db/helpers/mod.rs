//! Conversions between SQLite column values and Rust types.
//!
//! Rows written by this crate carry UTC timestamps with a `Z` suffix. Older
//! databases hold naive local wall-clock times, which are read in the server's
//! local zone. `ORDER BY timestamp` still compares the stored text, so a naive
//! row sorts by its wall-clock digits against `Z` rows and can land out of
//! place by up to the local UTC offset.

use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};

pub fn to_i64(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

/// Fixed-width RFC 3339 so that lexical order in SQLite matches time order.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Accepts RFC 3339, or a naive ISO-8601 timestamp (older rows) taken as local time.
pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .with_context(|| format!("failed to parse {field} '{value}'"))?;
    Ok(naive_local_to_utc(&naive))
}

/// Wall-clock times skipped by a DST jump have no local reading; those fall back to UTC.
fn naive_local_to_utc(naive: &NaiveDateTime) -> DateTime<Utc> {
    Local
        .from_local_datetime(naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(naive))
}
