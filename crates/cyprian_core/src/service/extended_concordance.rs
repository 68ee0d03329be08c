//! Multi-year concordance listing.
//!
//! # Responsibility
//! - List the Cyprian equivalent of every Gregorian day in an inclusive
//!   range of Gregorian years.
//!
//! # Invariants
//! - Rows are in Gregorian order, one per day, with no gaps.
//! - The cache is rebuilt at most once per Gregorian year in the range.

use crate::ephemeris::EphemerisOracle;
use crate::model::cyprian_date::CyprianDate;
use crate::repo::concordance_repo::ConcordanceStore;
use crate::service::concordance_builder::BuildTarget;
use crate::service::conversion_service::{ConversionError, ConversionResult, ConversionService};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One Gregorian day and its Cyprian equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equivalent {
    pub gregorian: NaiveDate,
    pub cyprian: CyprianDate,
}

/// Day-by-day listing over several Gregorian years.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedConcordance {
    pub start_year: i32,
    pub end_year: i32,
    pub equivalents: Vec<Equivalent>,
}

impl ExtendedConcordance {
    /// Converts every day from January 1 of `start_year` to December 31 of
    /// `end_year` through `service`, one cache connection per year.
    pub fn build<O: EphemerisOracle>(
        service: &ConversionService<O>,
        start_year: i32,
        end_year: i32,
    ) -> ConversionResult<Self> {
        if start_year > end_year {
            return Err(ConversionError::InconsistentState(
                "extended concordance start year is after end year",
            ));
        }

        let mut equivalents = Vec::new();
        for year in start_year..=end_year {
            let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(
                ConversionError::InconsistentState("extended concordance year out of range"),
            )?;
            service.with_fresh_store(BuildTarget::Gregorian(year), false, |store| {
                for day in first.iter_days().take_while(|day| day.year() == year) {
                    equivalents.push(Equivalent {
                        gregorian: day,
                        cyprian: store.lookup_by_gregorian(day)?,
                    });
                }
                Ok(())
            })?;
        }

        Ok(Self {
            start_year,
            end_year,
            equivalents,
        })
    }

    /// Rows on which either calendar starts a new month.
    pub fn month_boundaries(&self) -> impl Iterator<Item = &Equivalent> {
        self.equivalents
            .iter()
            .filter(|equivalent| equivalent.gregorian.day() == 1 || equivalent.cyprian.day == 1)
    }
}
