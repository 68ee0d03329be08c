//! Calendar domain model.
//!
//! # Responsibility
//! - Define the Cyprian date value and its day-advance algorithm.
//! - Define the combined Gregorian + Cyprian date-time value.
//!
//! # Invariants
//! - Month numbers stay within `1..=13`; month 13 is the intercalary month.
//! - Month lengths are never fixed in advance; they follow the new moons.

pub mod cyprian_date;
pub mod cyprian_datetime;
