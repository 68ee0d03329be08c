//! Gregorian instant paired with its Cyprian date.
//!
//! The Cyprian part is derived data. It is filled eagerly on construction,
//! dropped whenever the Gregorian part changes, and refreshed only by an
//! explicit [`CyprianDateTime::sync`].

use crate::ephemeris::EphemerisOracle;
use crate::model::cyprian_date::CyprianDate;
use crate::service::conversion_service::{ConversionError, ConversionResult, ConversionService};
use chrono::{DateTime, Days, Utc};
use serde::Serialize;

const GREGORIAN_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// Gregorian instant plus its synchronised Cyprian date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyprianDateTime {
    gregorian: DateTime<Utc>,
    cyprian: Option<CyprianDate>,
}

/// Serialized shape of a synchronised [`CyprianDateTime`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CyprianDateTimeRecord {
    /// `YYYY-MM-DD HH:MM:SS+00:00`.
    pub gregorian: String,
    pub cyprian: CyprianDateRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CyprianDateRecord {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// `DD MON TY` rendering.
    pub string: String,
}

impl From<CyprianDate> for CyprianDateRecord {
    fn from(value: CyprianDate) -> Self {
        Self {
            year: value.year,
            month: value.month,
            day: value.day,
            string: value.to_string(),
        }
    }
}

impl CyprianDateTime {
    /// Creates a synchronised value for `gregorian`.
    pub fn new<O: EphemerisOracle>(
        gregorian: DateTime<Utc>,
        service: &ConversionService<O>,
    ) -> ConversionResult<Self> {
        let mut value = Self::unsynchronized(gregorian);
        value.sync(service)?;
        Ok(value)
    }

    /// Creates a value whose Cyprian part is not yet known.
    pub fn unsynchronized(gregorian: DateTime<Utc>) -> Self {
        Self {
            gregorian,
            cyprian: None,
        }
    }

    /// Creates a synchronised value from a `DD MON TY` string.
    ///
    /// The Gregorian part is midnight UTC of the matching day.
    pub fn from_cyprian_str<O: EphemerisOracle>(
        value: &str,
        service: &ConversionService<O>,
    ) -> ConversionResult<Self> {
        let cyprian: CyprianDate = value.parse()?;
        let gregorian = service.convert_cyprian_to_gregorian(cyprian, false)?;
        Ok(Self {
            gregorian,
            cyprian: Some(cyprian),
        })
    }

    pub fn gregorian(&self) -> DateTime<Utc> {
        self.gregorian
    }

    /// Cyprian date, or `None` after the Gregorian part changed.
    pub fn cyprian(&self) -> Option<CyprianDate> {
        self.cyprian
    }

    pub fn is_synchronized(&self) -> bool {
        self.cyprian.is_some()
    }

    /// Replaces the Gregorian part; the Cyprian part must be re-synced.
    pub fn set_gregorian(&mut self, gregorian: DateTime<Utc>) {
        self.gregorian = gregorian;
        self.cyprian = None;
    }

    /// Shifts the Gregorian part by whole days; the Cyprian part must be
    /// re-synced.
    pub fn add_days(&mut self, days: u64) {
        self.set_gregorian(self.gregorian + Days::new(days));
    }

    /// Recomputes the Cyprian part from the Gregorian part.
    pub fn sync<O: EphemerisOracle>(
        &mut self,
        service: &ConversionService<O>,
    ) -> ConversionResult<CyprianDate> {
        let cyprian = service.convert_gregorian_to_cyprian(self.gregorian, false)?;
        self.cyprian = Some(cyprian);
        Ok(cyprian)
    }

    /// Serializable view of a synchronised value.
    pub fn to_record(&self) -> ConversionResult<CyprianDateTimeRecord> {
        let cyprian = self.cyprian.ok_or(ConversionError::Unsynchronized)?;
        Ok(CyprianDateTimeRecord {
            gregorian: self.gregorian.format(GREGORIAN_DISPLAY_FORMAT).to_string(),
            cyprian: cyprian.into(),
        })
    }

    /// Compact JSON rendering of [`Self::to_record`].
    pub fn to_json(&self) -> ConversionResult<String> {
        Ok(serde_json::to_string(&self.to_record()?)?)
    }
}
