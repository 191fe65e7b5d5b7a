//! Repository implementations for mapping persistence.
//!
//! Provides database operations for category mappings, mapping candidates and
//! the cache version counter.

mod candidate;
mod mapping;

pub use candidate::CandidateRepository;
pub use mapping::MappingRepository;

pub(crate) use candidate::upsert_candidate;
pub(crate) use mapping::upsert_mapping;

use crate::domain::StoreError;
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, Rows};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

pub type DbConn = Arc<Mutex<Connection>>;

pub(crate) fn lock(conn: &DbConn) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| anyhow!("mapping database lock poisoned"))
}

/// Advances the cache version token. Call inside the transaction that mutates mappings.
pub(crate) fn bump_cache_version(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE store_meta SET value = value + 1 WHERE name = 'cache_version'",
        [],
    )?;
    Ok(())
}

pub(crate) fn read_cache_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT value FROM store_meta WHERE name = 'cache_version'",
        [],
        |row| row.get(0),
    )
}

/// Decodes every row, skipping and logging the ones that fail to decode.
///
/// Both tables select `id` as the first column.
fn collect_valid<T>(
    mut rows: Rows<'_>,
    decode: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut decoded = Vec::new();
    while let Some(row) = rows.next()? {
        match decode(row) {
            Ok(value) => decoded.push(value),
            Err(err @ rusqlite::Error::FromSqlConversionFailure(..)) => {
                let id = row
                    .get::<_, String>(0)
                    .unwrap_or_else(|_| "<unreadable>".to_string());
                log::warn!("Skipping row: {}", corrupt_record(&id, &err));
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(decoded)
}

fn corrupt_record(id: &str, err: &rusqlite::Error) -> StoreError {
    StoreError::Corrupt {
        id: id.to_string(),
        reason: err.to_string(),
    }
}

/// Turns a decode failure of the row `id` into `StoreError::Corrupt`.
fn surface_corrupt(id: &str, err: rusqlite::Error) -> anyhow::Error {
    match err {
        rusqlite::Error::FromSqlConversionFailure(..) => corrupt_record(id, &err).into(),
        other => other.into(),
    }
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

#[derive(Debug)]
struct ParseError(String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseError {}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_optional_timestamp(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_timestamp(idx, &s)).transpose()
}

fn parse_enum<T: FromStr<Err = String>>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    T::from_str(raw).map_err(|e| conversion_error(idx, ParseError(e)))
}

fn parse_string_list(idx: usize, raw: &str) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| conversion_error(idx, e))
}
