//! Cyprian date value and day-advance algorithm.
//!
//! # Responsibility
//! - Hold a `(year, month, day)` triple in the Cyprian calendar.
//! - Step itself forward one Gregorian day using oracle-supplied new moons
//!   and vernal equinoxes.
//! - Format and parse the fixed-width `DD MON TY` representation.
//!
//! # Invariants
//! - `advance_one_day` never decreases `(year, month, day)` and never moves
//!   the month past [`LEAP_MONTH`].
//! - Month 13 is entered only when month 12 ends before the equinox.

use crate::ephemeris::anchors::{new_moon_tomorrow, tomorrow_is_on_or_after_vernal_equinox};
use crate::ephemeris::{EphemerisOracle, EphemerisResult};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Last ordinary month of the year.
pub const LAST_MONTH: u32 = 12;
/// Intercalary month inserted when month 12 ends before the equinox.
pub const LEAP_MONTH: u32 = 13;
/// Longest month a lunation can produce.
pub const MAX_DAY: u32 = 30;
/// Letter prefixed to the year number in formatted dates.
pub const YEAR_INITIAL: char = 'T';

/// Month names in calendar order; the first three letters are the
/// abbreviation used in formatted dates.
pub const MONTH_NAMES: [&str; 13] = [
    "Prima",
    "Secunda",
    "Tertia",
    "Quarta",
    "Quinta",
    "Sexta",
    "September",
    "October",
    "November",
    "December",
    "Undecember",
    "Duodecember",
    "Intercalaris",
];

static DATE_STRING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2})[ -]([A-Za-z]{3})[ -]T(-?\d+)$").expect("valid cyprian date regex")
});

/// Invalid Cyprian date value or string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CyprianDateError {
    /// Input does not match the `DD MON TY` layout.
    MalformedString(String),
    /// Month abbreviation is not one of the thirteen known names.
    UnknownMonth(String),
    MonthOutOfRange(u32),
    DayOutOfRange(u32),
}

impl Display for CyprianDateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedString(value) => {
                write!(f, "`{value}` is not a date in `DD MON TY` format")
            }
            Self::UnknownMonth(value) => write!(f, "unknown month abbreviation `{value}`"),
            Self::MonthOutOfRange(month) => {
                write!(f, "month {month} not in 1..={LEAP_MONTH}")
            }
            Self::DayOutOfRange(day) => write!(f, "day {day} not in 1..={MAX_DAY}"),
        }
    }
}

impl Error for CyprianDateError {}

/// A date in the Cyprian lunisolar calendar.
///
/// Ordering is lexicographic on `(year, month, day)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CyprianDate {
    pub year: i32,
    /// `1..=12` for ordinary months, 13 for Intercalaris.
    pub month: u32,
    pub day: u32,
}

impl CyprianDate {
    /// Creates a date without validating it; see [`Self::validate`].
    pub const fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    /// Checks that month and day are in their possible ranges.
    ///
    /// A date that passes may still not exist in a given year (month 13 or
    /// day 30 depend on the lunations); only a built concordance knows.
    pub fn validate(&self) -> Result<(), CyprianDateError> {
        if !(1..=LEAP_MONTH).contains(&self.month) {
            return Err(CyprianDateError::MonthOutOfRange(self.month));
        }
        if !(1..=MAX_DAY).contains(&self.day) {
            return Err(CyprianDateError::DayOutOfRange(self.day));
        }
        Ok(())
    }

    /// Whether this date lies in the intercalary month.
    pub fn is_intercalary(&self) -> bool {
        self.month == LEAP_MONTH
    }

    /// Full Latin name of the month, or `None` if the month is not in
    /// `1..=13`.
    pub fn month_name(&self) -> Option<&'static str> {
        month_name(self.month)
    }

    /// Steps forward to the date of the Gregorian day after `current_greg`.
    ///
    /// `current_greg` is the Gregorian day this date currently represents.
    /// The month turns over when the next new moon falls tomorrow.
    pub fn advance_one_day<O: EphemerisOracle + ?Sized>(
        &mut self,
        current_greg: DateTime<Utc>,
        oracle: &O,
    ) -> EphemerisResult<()> {
        if new_moon_tomorrow(oracle, current_greg)? {
            self.advance_one_month(current_greg, oracle)
        } else {
            self.day += 1;
            Ok(())
        }
    }

    fn advance_one_month<O: EphemerisOracle + ?Sized>(
        &mut self,
        current_greg: DateTime<Utc>,
        oracle: &O,
    ) -> EphemerisResult<()> {
        if self.month == LEAP_MONTH {
            self.advance_one_year();
        } else if self.month == LAST_MONTH
            && tomorrow_is_on_or_after_vernal_equinox(oracle, current_greg)?
        {
            self.advance_one_year();
        } else {
            assert!(
                self.month <= LAST_MONTH,
                "month {} advanced past {LEAP_MONTH}",
                self.month
            );
            self.month += 1;
            self.day = 1;
        }
        Ok(())
    }

    fn advance_one_year(&mut self) {
        self.year += 1;
        self.month = 1;
        self.day = 1;
    }
}

impl Display for CyprianDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let abbreviation = month_name(self.month).map_or("???", |name| &name[..3]);
        write!(
            f,
            "{:02} {} {}{}",
            self.day, abbreviation, YEAR_INITIAL, self.year
        )
    }
}

impl FromStr for CyprianDate {
    type Err = CyprianDateError;

    /// Parses `DD MON TY`; a hyphen may stand in for either space.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let captures = DATE_STRING_RE
            .captures(trimmed)
            .ok_or_else(|| CyprianDateError::MalformedString(trimmed.to_string()))?;

        let day: u32 = captures[1]
            .parse()
            .map_err(|_| CyprianDateError::MalformedString(trimmed.to_string()))?;
        let abbreviation = &captures[2];
        let month = month_from_abbreviation(abbreviation)
            .ok_or_else(|| CyprianDateError::UnknownMonth(abbreviation.to_string()))?;
        let year: i32 = captures[3]
            .parse()
            .map_err(|_| CyprianDateError::MalformedString(trimmed.to_string()))?;

        let date = Self::new(year, month, day);
        date.validate()?;
        Ok(date)
    }
}

/// Full Latin name of month `month` (1-based).
pub fn month_name(month: u32) -> Option<&'static str> {
    MONTH_NAMES.get(month.checked_sub(1)? as usize).copied()
}

/// Month number for a three-letter abbreviation such as `Pri` or `Int`.
pub fn month_from_abbreviation(abbreviation: &str) -> Option<u32> {
    MONTH_NAMES
        .iter()
        .position(|name| &name[..3] == abbreviation)
        .map(|idx| idx as u32 + 1)
}
