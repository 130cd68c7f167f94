//! Column codecs shared by the repositories.

use chrono::SecondsFormat;
use serde::de::DeserializeOwned;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use leadflow_domain::error::{LeadflowError, NotFoundError};
use leadflow_domain::time::Timestamp;

fn decode_error(err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

/// Fixed-width UTC text, so `<`/`>` on the column compare instants.
pub(crate) fn encode_ts(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn encode_opt_ts(ts: Option<Timestamp>) -> Option<String> {
    ts.map(encode_ts)
}

pub(crate) fn ts(row: &SqliteRow, column: &str) -> Result<Timestamp, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.to_utc())
        .map_err(decode_error)
}

pub(crate) fn opt_ts(row: &SqliteRow, column: &str) -> Result<Option<Timestamp>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| {
        chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.to_utc())
            .map_err(decode_error)
    })
    .transpose()
}

pub(crate) fn json<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).map_err(decode_error)
}

pub(crate) fn count(row: &SqliteRow, column: &str) -> Result<u64, sqlx::Error> {
    let raw: i64 = row.try_get(column)?;
    u64::try_from(raw).map_err(decode_error)
}

pub(crate) fn small_count(row: &SqliteRow, column: &str) -> Result<u32, sqlx::Error> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw).map_err(decode_error)
}

/// `SQLite` integers are signed; counters beyond `i64::MAX` saturate.
pub(crate) fn int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn parsed<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(decode_error)
}

pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> LeadflowError {
    NotFoundError {
        entity,
        id: id.to_string(),
    }
    .into()
}
