//! Concordance store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist the day-by-day `equivalence` rows and `ephemeral` build metadata.
//! - Serve exact-match lookups by Gregorian day, Cyprian date or metadata key.
//!
//! # Invariants
//! - `replace_all` deletes and rewrites both tables in one `BEGIN IMMEDIATE`
//!   transaction, so at most one writer runs at a time and readers see
//!   either the old span or the new one.
//! - Read paths reject invalid persisted values instead of masking them.

use crate::db::DbError;
use crate::model::cyprian_date::CyprianDate;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use log::{debug, error, info};
use rusqlite::{params, Connection, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

/// Well-known `ephemeral` keys written by every rebuild.
pub mod keys {
    pub const GREG_YEAR: &str = "greg_year";
    pub const CYPRIAN_YEAR: &str = "cyprian_year";
    pub const THIS_VERNAL_EQUINOX: &str = "this_vernal_equinox";
    pub const THIS_CYPRIAN_NEW_YEAR: &str = "this_cyprian_new_year";
    pub const BUILD_ID: &str = "build_id";
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Which way a point lookup failed to find exactly one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityKind {
    /// No row matched: the span is not built or does not cover the key.
    Empty,
    /// More than one row matched: the cache is corrupt.
    Duplicate,
}

/// A point lookup matched a row count other than one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupIntegrityError {
    /// Human-readable lookup key, e.g. `equivalence 2024-01-01`.
    pub target: String,
    pub rows: usize,
}

impl LookupIntegrityError {
    pub fn kind(&self) -> IntegrityKind {
        if self.rows == 0 {
            IntegrityKind::Empty
        } else {
            IntegrityKind::Duplicate
        }
    }
}

impl Display for LookupIntegrityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            IntegrityKind::Empty => write!(f, "no row found for {}", self.target),
            IntegrityKind::Duplicate => {
                write!(f, "{} rows found for {}; expected one", self.rows, self.target)
            }
        }
    }
}

impl Error for LookupIntegrityError {}

/// Repository error for concordance persistence and lookups.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    LookupIntegrity(LookupIntegrityError),
    InvalidData(String),
}

impl RepoError {
    /// Returns the integrity kind when this is a lookup integrity failure.
    pub fn integrity_kind(&self) -> Option<IntegrityKind> {
        match self {
            Self::LookupIntegrity(err) => Some(err.kind()),
            _ => None,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::LookupIntegrity(err) => write!(f, "concordance lookup failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted concordance data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::LookupIntegrity(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<LookupIntegrityError> for RepoError {
    fn from(value: LookupIntegrityError) -> Self {
        Self::LookupIntegrity(value)
    }
}

/// One Gregorian day and its Cyprian equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConcordanceEntry {
    pub gregorian: NaiveDate,
    pub cyprian: CyprianDate,
}

/// Metadata describing the span a rebuild produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMetadata {
    /// Gregorian year fully covered by the span.
    pub greg_year: i32,
    /// Cyprian year fully covered by the span.
    pub cyprian_year: i32,
    pub this_vernal_equinox: DateTime<Utc>,
    /// Midnight UTC of the day the Cyprian year begins.
    pub this_cyprian_new_year: DateTime<Utc>,
    /// Fresh for every rebuild.
    pub build_id: Uuid,
}

impl BuildMetadata {
    /// Key/value rows as persisted in `ephemeral`.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (keys::GREG_YEAR, self.greg_year.to_string()),
            (keys::CYPRIAN_YEAR, self.cyprian_year.to_string()),
            (keys::THIS_VERNAL_EQUINOX, self.this_vernal_equinox.to_rfc3339()),
            (
                keys::THIS_CYPRIAN_NEW_YEAR,
                self.this_cyprian_new_year.to_rfc3339(),
            ),
            (keys::BUILD_ID, self.build_id.to_string()),
        ]
    }
}

/// Store interface for the cached concordance span.
pub trait ConcordanceStore {
    /// Replaces every entry and every metadata row in one atomic unit.
    fn replace_all(
        &mut self,
        entries: &[ConcordanceEntry],
        metadata: &BuildMetadata,
    ) -> RepoResult<()>;
    /// Returns the Cyprian date stored for one Gregorian day.
    fn lookup_by_gregorian(&self, date: NaiveDate) -> RepoResult<CyprianDate>;
    /// Returns the Gregorian day stored for one Cyprian date.
    fn lookup_by_cyprian(&self, date: CyprianDate) -> RepoResult<NaiveDate>;
    /// Returns the raw value of one metadata key.
    fn get_metadata(&self, key: &str) -> RepoResult<String>;
    /// Reads and parses all build metadata.
    fn load_metadata(&self) -> RepoResult<BuildMetadata>;
    /// Number of stored equivalence rows.
    fn count_entries(&self) -> RepoResult<u64>;
}

/// SQLite-backed concordance store.
pub struct SqliteConcordanceRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteConcordanceRepository<'conn> {
    /// Wraps a migrated connection (see [`crate::db::open_db`]).
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl ConcordanceStore for SqliteConcordanceRepository<'_> {
    fn replace_all(
        &mut self,
        entries: &[ConcordanceEntry],
        metadata: &BuildMetadata,
    ) -> RepoResult<()> {
        let started_at = Instant::now();
        info!(
            "event=concordance_replace module=repo status=start entries={} build_id={}",
            entries.len(),
            metadata.build_id
        );

        match replace_all_in_tx(self.conn, entries, metadata) {
            Ok(()) => {
                info!(
                    "event=concordance_replace module=repo status=ok entries={} greg_year={} cyprian_year={} duration_ms={}",
                    entries.len(),
                    metadata.greg_year,
                    metadata.cyprian_year,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=concordance_replace module=repo status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn lookup_by_gregorian(&self, date: NaiveDate) -> RepoResult<CyprianDate> {
        let mut stmt = self.conn.prepare(
            "SELECT cyprian_year, cyprian_month, cyprian_day
             FROM equivalence
             WHERE greg_year = ?1
               AND greg_month = ?2
               AND greg_day = ?3;",
        )?;
        let mut rows = stmt.query(params![date.year(), date.month(), date.day()])?;
        let mut found = Vec::new();
        while let Some(row) = rows.next()? {
            found.push(CyprianDate::new(row.get(0)?, row.get(1)?, row.get(2)?));
        }

        let cyprian = exactly_one(found, || format!("equivalence {date}"))?;
        cyprian
            .validate()
            .map_err(|err| RepoError::InvalidData(format!("row for {date}: {err}")))?;
        debug!("event=concordance_lookup module=repo status=ok axis=gregorian key={date}");
        Ok(cyprian)
    }

    fn lookup_by_cyprian(&self, date: CyprianDate) -> RepoResult<NaiveDate> {
        let mut stmt = self.conn.prepare(
            "SELECT greg_year, greg_month, greg_day
             FROM equivalence
             WHERE cyprian_year = ?1
               AND cyprian_month = ?2
               AND cyprian_day = ?3;",
        )?;
        let mut rows = stmt.query(params![date.year, date.month, date.day])?;
        let mut found = Vec::new();
        while let Some(row) = rows.next()? {
            let (year, month, day): (i32, u32, u32) = (row.get(0)?, row.get(1)?, row.get(2)?);
            let gregorian = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid gregorian date {year:04}-{month:02}-{day:02} for {date}"
                ))
            })?;
            found.push(gregorian);
        }

        let gregorian = exactly_one(found, || format!("equivalence {date}"))?;
        debug!("event=concordance_lookup module=repo status=ok axis=cyprian key={date}");
        Ok(gregorian)
    }

    fn get_metadata(&self, key: &str) -> RepoResult<String> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM ephemeral WHERE key = ?1;")?;
        let mut rows = stmt.query([key])?;
        let mut found = Vec::new();
        while let Some(row) = rows.next()? {
            found.push(row.get::<_, String>(0)?);
        }
        Ok(exactly_one(found, || format!("ephemeral `{key}`"))?)
    }

    fn load_metadata(&self) -> RepoResult<BuildMetadata> {
        Ok(BuildMetadata {
            greg_year: parse_value(keys::GREG_YEAR, &self.get_metadata(keys::GREG_YEAR)?)?,
            cyprian_year: parse_value(keys::CYPRIAN_YEAR, &self.get_metadata(keys::CYPRIAN_YEAR)?)?,
            this_vernal_equinox: parse_instant(
                keys::THIS_VERNAL_EQUINOX,
                &self.get_metadata(keys::THIS_VERNAL_EQUINOX)?,
            )?,
            this_cyprian_new_year: parse_instant(
                keys::THIS_CYPRIAN_NEW_YEAR,
                &self.get_metadata(keys::THIS_CYPRIAN_NEW_YEAR)?,
            )?,
            build_id: parse_value(keys::BUILD_ID, &self.get_metadata(keys::BUILD_ID)?)?,
        })
    }

    fn count_entries(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM equivalence;", [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative equivalence count {count}")))
    }
}

fn replace_all_in_tx(
    conn: &mut Connection,
    entries: &[ConcordanceEntry],
    metadata: &BuildMetadata,
) -> RepoResult<()> {
    // IMMEDIATE takes the write lock up front; a concurrent rebuild waits
    // for the busy timeout instead of interleaving with this one.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute("DELETE FROM equivalence;", [])?;
    tx.execute("DELETE FROM ephemeral;", [])?;

    {
        let mut insert_entry = tx.prepare(
            "INSERT INTO equivalence (
                greg_year,
                greg_month,
                greg_day,
                cyprian_year,
                cyprian_month,
                cyprian_day
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        )?;
        for entry in entries {
            insert_entry.execute(params![
                entry.gregorian.year(),
                entry.gregorian.month(),
                entry.gregorian.day(),
                entry.cyprian.year,
                entry.cyprian.month,
                entry.cyprian.day,
            ])?;
        }

        let mut insert_metadata =
            tx.prepare("INSERT INTO ephemeral (key, value) VALUES (?1, ?2);")?;
        for (key, value) in metadata.to_pairs() {
            insert_metadata.execute(params![key, value])?;
        }
    }

    tx.commit()?;
    Ok(())
}

fn exactly_one<T>(mut found: Vec<T>, target: impl FnOnce() -> String) -> Result<T, LookupIntegrityError> {
    if found.len() == 1 {
        if let Some(value) = found.pop() {
            return Ok(value);
        }
    }
    Err(LookupIntegrityError {
        target: target(),
        rows: found.len(),
    })
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> RepoResult<T> {
    value
        .parse()
        .map_err(|_| RepoError::InvalidData(format!("invalid value `{value}` in ephemeral.{key}")))
}

fn parse_instant(key: &str, value: &str) -> RepoResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|_| RepoError::InvalidData(format!("invalid instant `{value}` in ephemeral.{key}")))
}
