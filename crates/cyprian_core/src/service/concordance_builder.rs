//! Concordance builder.
//!
//! # Responsibility
//! - Resolve a requested Gregorian or Cyprian year into the paired span.
//! - Walk the span day by day, recording every (Gregorian, Cyprian) pair.
//! - Hand the finished span to a [`ConcordanceStore`] in one write.
//!
//! # Invariants
//! - The walk starts at the new year of the previous Cyprian year and stops
//!   once the Cyprian year passes the target, so both the target Gregorian
//!   year and the target Cyprian year are covered completely.
//! - Nothing is written unless the whole walk succeeded.

use crate::config::CalendarConfig;
use crate::ephemeris::anchors::cyprian_new_year;
use crate::ephemeris::EphemerisOracle;
use crate::model::cyprian_date::CyprianDate;
use crate::repo::concordance_repo::{BuildMetadata, ConcordanceEntry, ConcordanceStore};
use crate::service::conversion_service::{ConversionError, ConversionResult};
use chrono::Days;
use log::{debug, error, info};
use std::collections::HashSet;
use std::time::Instant;
use uuid::Uuid;

/// Hard bound on walked days; two Cyprian years never exceed 26 lunations.
pub const MAX_WALK_DAYS: usize = 800;

/// Year a build is keyed on. Exactly one axis is authoritative per build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildTarget {
    Gregorian(i32),
    Cyprian(i32),
}

impl BuildTarget {
    /// Returns the `(greg_year, cyprian_year)` pair this target builds.
    pub fn resolve(self, config: &CalendarConfig) -> (i32, i32) {
        match self {
            Self::Gregorian(greg_year) => {
                (greg_year, config.cyprian_year_beginning_with(greg_year))
            }
            Self::Cyprian(cyprian_year) => {
                (config.greg_year_ending_with(cyprian_year), cyprian_year)
            }
        }
    }
}

/// A fully walked span ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concordance {
    /// In Gregorian order, one per day.
    pub entries: Vec<ConcordanceEntry>,
    pub metadata: BuildMetadata,
}

impl Concordance {
    /// Checks that both projections of the span are duplicate-free.
    pub fn verify_bijection(&self) -> ConversionResult<()> {
        let gregorian: HashSet<_> = self.entries.iter().map(|entry| entry.gregorian).collect();
        let cyprian: HashSet<_> = self.entries.iter().map(|entry| entry.cyprian).collect();
        if gregorian.len() != self.entries.len() {
            return Err(ConversionError::InconsistentState(
                "gregorian day repeated in concordance span",
            ));
        }
        if cyprian.len() != self.entries.len() {
            return Err(ConversionError::InconsistentState(
                "cyprian date repeated in concordance span",
            ));
        }
        Ok(())
    }
}

/// Walks concordance spans using one oracle and one configuration.
pub struct ConcordanceBuilder<'a, O: EphemerisOracle + ?Sized> {
    config: &'a CalendarConfig,
    oracle: &'a O,
}

impl<'a, O: EphemerisOracle + ?Sized> ConcordanceBuilder<'a, O> {
    pub fn new(config: &'a CalendarConfig, oracle: &'a O) -> Self {
        Self { config, oracle }
    }

    /// Walks the span for `target` without touching any store.
    ///
    /// # Errors
    /// - `Ephemeris` when any oracle call fails.
    /// - `WalkOverrun` when the walk does not finish within [`MAX_WALK_DAYS`].
    pub fn build(&self, target: BuildTarget) -> ConversionResult<Concordance> {
        let started_at = Instant::now();
        let (greg_year, cyprian_year) = target.resolve(self.config);
        info!(
            "event=concordance_build module=service status=start greg_year={greg_year} cyprian_year={cyprian_year}"
        );

        match self.walk(greg_year, cyprian_year) {
            Ok(concordance) => {
                info!(
                    "event=concordance_build module=service status=ok greg_year={} cyprian_year={} entries={} duration_ms={}",
                    greg_year,
                    cyprian_year,
                    concordance.entries.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(concordance)
            }
            Err(err) => {
                error!(
                    "event=concordance_build module=service status=error greg_year={} cyprian_year={} duration_ms={} error={}",
                    greg_year,
                    cyprian_year,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Builds the span for `target` and replaces the store contents with it.
    pub fn write<S: ConcordanceStore + ?Sized>(
        &self,
        store: &mut S,
        target: BuildTarget,
    ) -> ConversionResult<BuildMetadata> {
        let concordance = self.build(target)?;
        concordance.verify_bijection()?;
        store.replace_all(&concordance.entries, &concordance.metadata)?;
        Ok(concordance.metadata)
    }

    fn walk(&self, greg_year: i32, cyprian_year: i32) -> ConversionResult<Concordance> {
        let last_vernal_equinox = self.oracle.vernal_equinox(greg_year - 1)?;
        let this_vernal_equinox = self.oracle.vernal_equinox(greg_year)?;
        let last_cyprian_new_year = cyprian_new_year(self.oracle, greg_year - 1)?;
        let this_cyprian_new_year = cyprian_new_year(self.oracle, greg_year)?;
        debug!(
            "event=concordance_anchors module=service last_equinox={last_vernal_equinox} this_equinox={this_vernal_equinox} last_new_year={last_cyprian_new_year} this_new_year={this_cyprian_new_year}"
        );

        let mut greg = last_cyprian_new_year;
        let mut cyprian = CyprianDate::new(cyprian_year - 1, 1, 1);
        let mut entries = Vec::with_capacity(2 * 385);

        while cyprian.year <= cyprian_year {
            if entries.len() >= MAX_WALK_DAYS {
                return Err(ConversionError::WalkOverrun {
                    days: entries.len(),
                    reached: cyprian,
                });
            }
            entries.push(ConcordanceEntry {
                gregorian: greg.date_naive(),
                cyprian,
            });
            cyprian.advance_one_day(greg, self.oracle)?;
            greg = greg + Days::new(1);
        }

        Ok(Concordance {
            entries,
            metadata: BuildMetadata {
                greg_year,
                cyprian_year,
                this_vernal_equinox,
                this_cyprian_new_year,
                build_id: Uuid::new_v4(),
            },
        })
    }
}
