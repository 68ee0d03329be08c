//! Calendar configuration passed explicitly into builders and services.
//!
//! # Responsibility
//! - Carry the epoch offset between Gregorian and Cyprian year numbers.
//! - Carry the location of the concordance cache database.
//!
//! # Invariants
//! - Cyprian year `n` begins in Gregorian year `n + epoch_offset`.
//! - Nothing in core reads these values from globals; two configs with
//!   different offsets or paths can coexist in one process.

use std::path::{Path, PathBuf};

/// Gregorian year minus Cyprian year for the year that begins within it.
pub const DEFAULT_EPOCH_OFFSET: i32 = 2013;
/// Cache file name placed in the user's home directory by default.
pub const DEFAULT_DB_FILE_NAME: &str = ".cyprian_datetime_cache.db";

/// Calendar and cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarConfig {
    /// Gregorian year minus the Cyprian year beginning within it.
    pub epoch_offset: i32,
    /// Path of the SQLite concordance cache.
    pub db_path: PathBuf,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            epoch_offset: DEFAULT_EPOCH_OFFSET,
            db_path: default_db_path(),
        }
    }
}

impl CalendarConfig {
    /// Returns the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the cache location.
    pub fn with_db_path(mut self, db_path: impl AsRef<Path>) -> Self {
        self.db_path = db_path.as_ref().to_path_buf();
        self
    }

    /// Overrides the Gregorian/Cyprian year offset.
    pub fn with_epoch_offset(mut self, epoch_offset: i32) -> Self {
        self.epoch_offset = epoch_offset;
        self
    }

    /// Cyprian year whose new year falls within Gregorian `greg_year`.
    pub fn cyprian_year_beginning_with(&self, greg_year: i32) -> i32 {
        greg_year - self.epoch_offset
    }

    /// Gregorian year paired with `cyprian_year` when building a cache.
    ///
    /// Inverse of [`Self::cyprian_year_beginning_with`].
    pub fn greg_year_ending_with(&self, cyprian_year: i32) -> i32 {
        cyprian_year + self.epoch_offset
    }
}

/// `$HOME/.cyprian_datetime_cache.db`, or the temp directory when no home
/// directory is known.
pub fn default_db_path() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(DEFAULT_DB_FILE_NAME)
}
