//! Timestamp encoding shared by every table.
//!
//! Timestamps are stored as fixed-width RFC 3339 text in UTC with microsecond
//! precision, so lexical order in SQL equals chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;

pub(crate) fn to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a stored timestamp inside a row mapper.
pub(crate) fn from_sql(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// `now - days`, encoded for comparison against stored columns.
pub(crate) fn cutoff_days(days: u32) -> String {
    to_sql(&(now() - chrono::Duration::days(i64::from(days))))
}
