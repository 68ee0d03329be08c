//! Per-year astronomical anchors of the Cyprian calendar.
//!
//! # Responsibility
//! - Reduce oracle instants to calendar days (midnight UTC).
//! - Derive the two anchors the calendar depends on: the vernal equinox and
//!   the Cyprian new year (first new moon at or after the equinox).
//!
//! # Invariants
//! - Every comparison here is day-granular; time of day never matters.
//! - Anchors are recomputed on demand and never cached on their own.

use super::{EphemerisOracle, EphemerisResult};
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeDelta, Utc};

/// Truncates an instant to midnight UTC of the same day.
pub fn truncate_to_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    midnight(instant.date_naive())
}

/// Midnight UTC at the start of `date`.
pub fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Whether two instants fall on the same UTC calendar day.
pub fn same_day(left: DateTime<Utc>, right: DateTime<Utc>) -> bool {
    left.date_naive() == right.date_naive()
}

/// Whether the next new moon after `current` falls on the following day.
pub fn new_moon_tomorrow<O: EphemerisOracle + ?Sized>(
    oracle: &O,
    current: DateTime<Utc>,
) -> EphemerisResult<bool> {
    let next_new_moon = oracle.next_new_moon(current)?;
    Ok(same_day(next_new_moon, current + Days::new(1)))
}

/// Whether the day after `current` is on or after the vernal equinox of
/// `current`'s year.
pub fn tomorrow_is_on_or_after_vernal_equinox<O: EphemerisOracle + ?Sized>(
    oracle: &O,
    current: DateTime<Utc>,
) -> EphemerisResult<bool> {
    let equinox = oracle.vernal_equinox(current.year())?;
    let tomorrow = (current + Days::new(1)).date_naive();
    Ok(tomorrow >= equinox.date_naive())
}

/// Gregorian day (as midnight UTC) on which the Cyprian year beginning in
/// Gregorian `year` starts: the first day on or after the equinox day that
/// holds a new moon.
///
/// Matches the rollover rule of the day advance, so a new moon earlier on
/// the equinox day itself still opens the year.
pub fn cyprian_new_year<O: EphemerisOracle + ?Sized>(
    oracle: &O,
    year: i32,
) -> EphemerisResult<DateTime<Utc>> {
    let equinox_day = truncate_to_day(oracle.vernal_equinox(year)?);
    let new_moon = oracle.next_new_moon(equinox_day - TimeDelta::milliseconds(1))?;
    Ok(truncate_to_day(new_moon))
}
