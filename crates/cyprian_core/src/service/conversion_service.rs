//! Conversion facade and cache freshness policy.
//!
//! # Responsibility
//! - Answer Gregorian -> Cyprian and Cyprian -> Gregorian conversions.
//! - Rebuild the cached span first whenever it does not cover the request.
//!
//! # Invariants
//! - A store connection lives for exactly one public call and is released
//!   on every exit path.
//! - Repeated conversions against an unchanged cache perform no writes.
//! - Errors propagate unchanged; nothing is retried or guessed.

use crate::config::CalendarConfig;
use crate::db::{open_db, DbError};
use crate::ephemeris::anchors::midnight;
use crate::ephemeris::{EphemerisError, EphemerisOracle, MeeusEphemeris};
use crate::model::cyprian_date::{CyprianDate, CyprianDateError};
use crate::repo::concordance_repo::{
    BuildMetadata, ConcordanceStore, IntegrityKind, RepoError, RepoResult,
    SqliteConcordanceRepository,
};
use crate::service::concordance_builder::{BuildTarget, ConcordanceBuilder};
use chrono::{DateTime, Datelike, Utc};
use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type ConversionResult<T> = Result<T, ConversionError>;

/// Service error for conversion and rebuild use-cases.
#[derive(Debug)]
pub enum ConversionError {
    /// Ephemeris Oracle failed; the store was left untouched.
    Ephemeris(EphemerisError),
    /// Persistence failure, including lookup integrity errors.
    Repo(RepoError),
    /// Cyprian date is outside its possible ranges.
    InvalidDate(CyprianDateError),
    /// Day walk did not reach the end of the span within its bound.
    WalkOverrun { days: usize, reached: CyprianDate },
    /// Built span or requested range is internally inconsistent.
    InconsistentState(&'static str),
    /// Combined date-time was read before its Cyprian part was synchronised.
    Unsynchronized,
    Serialization(serde_json::Error),
}

impl ConversionError {
    /// Integrity kind when the failure is a concordance lookup miss or
    /// duplicate.
    pub fn integrity_kind(&self) -> Option<IntegrityKind> {
        match self {
            Self::Repo(err) => err.integrity_kind(),
            _ => None,
        }
    }
}

impl Display for ConversionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ephemeris(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InvalidDate(err) => write!(f, "invalid cyprian date: {err}"),
            Self::WalkOverrun { days, reached } => write!(
                f,
                "concordance walk did not finish after {days} days (reached {reached})"
            ),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent concordance state: {details}")
            }
            Self::Unsynchronized => write!(f, "cyprian date has not been synchronised"),
            Self::Serialization(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConversionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ephemeris(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::InvalidDate(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EphemerisError> for ConversionError {
    fn from(value: EphemerisError) -> Self {
        Self::Ephemeris(value)
    }
}

impl From<RepoError> for ConversionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<DbError> for ConversionError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<CyprianDateError> for ConversionError {
    fn from(value: CyprianDateError) -> Self {
        Self::InvalidDate(value)
    }
}

impl From<serde_json::Error> for ConversionError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Decides whether the store must be rebuilt before answering a request.
///
/// Returns `true` when the store has not been built (a metadata key is
/// missing). Otherwise the supplied year(s) must match the covered year(s)
/// exactly.
///
/// # Errors
/// Duplicate or unparsable metadata is corruption, not staleness; it is
/// returned to the caller instead of being rebuilt over.
pub fn needs_rebuild<S: ConcordanceStore + ?Sized>(
    store: &S,
    greg_year: Option<i32>,
    cyprian_year: Option<i32>,
) -> RepoResult<bool> {
    let metadata = match store.load_metadata() {
        Ok(metadata) => metadata,
        Err(err) if err.integrity_kind() == Some(IntegrityKind::Empty) => return Ok(true),
        Err(err) => {
            error!(
                "event=concordance_freshness module=service status=corrupt error={}",
                err
            );
            return Err(err);
        }
    };

    Ok(greg_year.is_some_and(|year| year != metadata.greg_year)
        || cyprian_year.is_some_and(|year| year != metadata.cyprian_year))
}

/// Public conversion facade over the persisted concordance.
pub struct ConversionService<O: EphemerisOracle> {
    config: CalendarConfig,
    oracle: O,
}

impl ConversionService<MeeusEphemeris> {
    /// Creates a service using the bundled Meeus ephemeris.
    pub fn with_config(config: CalendarConfig) -> Self {
        Self::new(config, MeeusEphemeris::new())
    }
}

impl<O: EphemerisOracle> ConversionService<O> {
    pub fn new(config: CalendarConfig, oracle: O) -> Self {
        Self { config, oracle }
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Converts a Gregorian instant into its Cyprian date.
    ///
    /// Rebuilds the cache for `instant`'s Gregorian year first when forced
    /// or when the cache does not cover that year.
    pub fn convert_gregorian_to_cyprian(
        &self,
        instant: DateTime<Utc>,
        force_rebuild: bool,
    ) -> ConversionResult<CyprianDate> {
        let started_at = Instant::now();
        let cyprian = self.with_fresh_store(
            BuildTarget::Gregorian(instant.year()),
            force_rebuild,
            |store| Ok(store.lookup_by_gregorian(instant.date_naive())?),
        )?;
        info!(
            "event=conversion module=service status=ok direction=gregorian_to_cyprian duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(cyprian)
    }

    /// Converts a Cyprian date into the Gregorian day (midnight UTC) it
    /// falls on.
    pub fn convert_cyprian_to_gregorian(
        &self,
        date: CyprianDate,
        force_rebuild: bool,
    ) -> ConversionResult<DateTime<Utc>> {
        date.validate()?;
        let started_at = Instant::now();
        let gregorian = self.with_fresh_store(
            BuildTarget::Cyprian(date.year),
            force_rebuild,
            |store| Ok(store.lookup_by_cyprian(date)?),
        )?;
        info!(
            "event=conversion module=service status=ok direction=cyprian_to_gregorian duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(midnight(gregorian))
    }

    /// Rebuilds the cache for `target` unconditionally.
    pub fn rebuild(&self, target: BuildTarget) -> ConversionResult<BuildMetadata> {
        let mut conn = self.connect()?;
        let mut store = SqliteConcordanceRepository::new(&mut conn);
        self.rebuild_store(&mut store, target)
    }

    /// Reports whether a request for the given year(s) would rebuild.
    pub fn needs_rebuild(
        &self,
        greg_year: Option<i32>,
        cyprian_year: Option<i32>,
    ) -> ConversionResult<bool> {
        let mut conn = self.connect()?;
        let store = SqliteConcordanceRepository::new(&mut conn);
        Ok(needs_rebuild(&store, greg_year, cyprian_year)?)
    }

    /// Metadata of the currently cached span.
    pub fn metadata(&self) -> ConversionResult<BuildMetadata> {
        let mut conn = self.connect()?;
        let store = SqliteConcordanceRepository::new(&mut conn);
        Ok(store.load_metadata()?)
    }

    /// Runs `read` against one connection whose cache covers `target`,
    /// rebuilding first when forced or stale.
    pub(crate) fn with_fresh_store<T>(
        &self,
        target: BuildTarget,
        force_rebuild: bool,
        read: impl FnOnce(&SqliteConcordanceRepository<'_>) -> ConversionResult<T>,
    ) -> ConversionResult<T> {
        let mut conn = self.connect()?;
        let mut store = SqliteConcordanceRepository::new(&mut conn);

        let (greg_year, cyprian_year) = match target {
            BuildTarget::Gregorian(year) => (Some(year), None),
            BuildTarget::Cyprian(year) => (None, Some(year)),
        };
        if force_rebuild || needs_rebuild(&store, greg_year, cyprian_year)? {
            self.rebuild_store(&mut store, target)?;
        }
        read(&store)
    }

    fn rebuild_store<S: ConcordanceStore + ?Sized>(
        &self,
        store: &mut S,
        target: BuildTarget,
    ) -> ConversionResult<BuildMetadata> {
        ConcordanceBuilder::new(&self.config, &self.oracle).write(store, target)
    }

    fn connect(&self) -> ConversionResult<Connection> {
        Ok(open_db(&self.config.db_path)?)
    }
}
