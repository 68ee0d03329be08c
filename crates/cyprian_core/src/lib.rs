//! Core logic for converting between Gregorian dates and the Cyprian
//! lunisolar calendar.
//!
//! Cyprian months begin on new moons and the year begins with the first new
//! moon on or after the vernal equinox, so there is no closed-form mapping.
//! This crate walks whole spans day by day, caches the resulting
//! concordance in SQLite and answers single-date conversions from it.

pub mod config;
pub mod db;
pub mod ephemeris;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::CalendarConfig;
pub use ephemeris::{EphemerisError, EphemerisOracle, MeeusEphemeris};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::cyprian_date::{CyprianDate, CyprianDateError};
pub use model::cyprian_datetime::CyprianDateTime;
pub use repo::concordance_repo::{
    BuildMetadata, ConcordanceEntry, ConcordanceStore, IntegrityKind, LookupIntegrityError,
    RepoError, RepoResult, SqliteConcordanceRepository,
};
pub use service::concordance_builder::{BuildTarget, Concordance, ConcordanceBuilder};
pub use service::conversion_service::{
    needs_rebuild, ConversionError, ConversionResult, ConversionService,
};
pub use service::extended_concordance::{Equivalent, ExtendedConcordance};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
