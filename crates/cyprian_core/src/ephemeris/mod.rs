//! Ephemeris Oracle boundary.
//!
//! # Responsibility
//! - Define the contract for astronomical event instants consumed by the
//!   calendar (next new moon, vernal equinox).
//! - Provide the bundled [`MeeusEphemeris`] implementation and the anchor
//!   helpers derived from it.
//!
//! # Invariants
//! - All instants crossing this boundary are UTC.
//! - Oracle implementations are stateless; identical inputs give identical
//!   outputs.

use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod anchors;
pub mod julian;
pub mod meeus;

pub use meeus::MeeusEphemeris;

pub type EphemerisResult<T> = Result<T, EphemerisError>;

/// Oracle failure. Surfaced to callers as fatal for the current operation.
#[derive(Debug, Clone, PartialEq)]
pub enum EphemerisError {
    /// Requested year lies outside the range the oracle can compute.
    OutOfRange { year: i32, min: i32, max: i32 },
    /// Computed Julian day cannot be expressed as a UTC instant.
    Unrepresentable(f64),
    /// Oracle backend failed for a reason of its own.
    Unavailable(String),
}

impl Display for EphemerisError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { year, min, max } => write!(
                f,
                "ephemeris unavailable for year {year}; supported range is {min}..={max}"
            ),
            Self::Unrepresentable(jd) => {
                write!(f, "julian day {jd} is not a representable UTC instant")
            }
            Self::Unavailable(message) => write!(f, "ephemeris unavailable: {message}"),
        }
    }
}

impl Error for EphemerisError {}

/// Source of astronomical event instants.
pub trait EphemerisOracle {
    /// Returns the first new moon strictly after `after`.
    fn next_new_moon(&self, after: DateTime<Utc>) -> EphemerisResult<DateTime<Utc>>;
    /// Returns the instant of the March (vernal) equinox of `year`.
    fn vernal_equinox(&self, year: i32) -> EphemerisResult<DateTime<Utc>>;
}

impl<T: EphemerisOracle + ?Sized> EphemerisOracle for &T {
    fn next_new_moon(&self, after: DateTime<Utc>) -> EphemerisResult<DateTime<Utc>> {
        (**self).next_new_moon(after)
    }

    fn vernal_equinox(&self, year: i32) -> EphemerisResult<DateTime<Utc>> {
        (**self).vernal_equinox(year)
    }
}
