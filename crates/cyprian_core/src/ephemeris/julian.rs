//! Julian day <-> UTC instant conversion.

use super::{EphemerisError, EphemerisResult};
use chrono::{DateTime, Utc};

/// Julian day of the Unix epoch, 1970-01-01T00:00Z.
pub const UNIX_EPOCH_JD: f64 = 2_440_587.5;
/// Julian day of J2000.0, 2000-01-01T12:00 TT.
pub const J2000_JD: f64 = 2_451_545.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Converts a UTC instant into a (fractional) Julian day.
pub fn to_julian_day(instant: DateTime<Utc>) -> f64 {
    let millis = instant.timestamp_millis() as f64;
    millis / 1000.0 / SECONDS_PER_DAY + UNIX_EPOCH_JD
}

/// Converts a Julian day into a UTC instant, rounded to the millisecond.
pub fn from_julian_day(jd: f64) -> EphemerisResult<DateTime<Utc>> {
    if !jd.is_finite() {
        return Err(EphemerisError::Unrepresentable(jd));
    }
    let millis = ((jd - UNIX_EPOCH_JD) * SECONDS_PER_DAY * 1000.0).round();
    if millis < i64::MIN as f64 || millis > i64::MAX as f64 {
        return Err(EphemerisError::Unrepresentable(jd));
    }
    DateTime::from_timestamp_millis(millis as i64).ok_or(EphemerisError::Unrepresentable(jd))
}

/// Approximate decimal year of a Julian day, good enough for ΔT lookup.
pub fn decimal_year(jd: f64) -> f64 {
    2000.0 + (jd - J2000_JD) / 365.25
}
