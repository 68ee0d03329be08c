use chrono::{DateTime, Days, TimeZone, Utc};
use cyprian_core::{
    CalendarConfig, ConversionError, ConversionService, CyprianDate, CyprianDateTime,
    EphemerisError, EphemerisOracle, ExtendedConcordance, MeeusEphemeris,
};
use std::cell::Cell;
use std::path::Path;

#[test]
fn new_value_is_synchronised() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());
    let gregorian = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let value = CyprianDateTime::new(gregorian, &service).unwrap();
    assert!(value.is_synchronized());
    assert_eq!(gregorian, value.gregorian());
    assert_eq!(Some(CyprianDate::new(10, 10, 21)), value.cyprian());
}

#[test]
fn shifting_gregorian_requires_explicit_sync() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());
    let mut value =
        CyprianDateTime::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), &service)
            .unwrap();

    value.add_days(1);
    assert!(!value.is_synchronized());
    assert!(matches!(value.to_json(), Err(ConversionError::Unsynchronized)));

    let cyprian = value.sync(&service).unwrap();
    assert_eq!(CyprianDate::new(10, 10, 22), cyprian);
    assert_eq!(Some(cyprian), value.cyprian());
}

#[test]
fn parses_cyprian_string_to_gregorian_midnight() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());

    let value = CyprianDateTime::from_cyprian_str("01-Pri-T1", &service).unwrap();
    assert_eq!(
        Utc.with_ymd_and_hms(2014, 3, 30, 0, 0, 0).unwrap(),
        value.gregorian()
    );
    assert_eq!(Some(CyprianDate::new(1, 1, 1)), value.cyprian());
}

#[test]
fn malformed_cyprian_string_is_invalid_date() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());

    let err = CyprianDateTime::from_cyprian_str("1st of Prima", &service).unwrap_err();
    assert!(matches!(err, ConversionError::InvalidDate(_)));
}

#[test]
fn json_rendering_matches_published_layout() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());
    let value =
        CyprianDateTime::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), &service)
            .unwrap();

    assert_eq!(
        r#"{"gregorian":"2024-01-01 00:00:00+00:00","cyprian":{"year":10,"month":10,"day":21,"string":"21 Dec T10"}}"#,
        value.to_json().unwrap()
    );
}

#[test]
fn extended_concordance_lists_every_day_of_the_range() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());

    let concordance = ExtendedConcordance::build(&service, 2025, 2025).unwrap();
    assert_eq!(365, concordance.equivalents.len());

    let easter = concordance
        .equivalents
        .iter()
        .find(|equivalent| equivalent.gregorian.to_string() == "2025-04-20")
        .unwrap();
    assert_eq!(CyprianDate::new(12, 1, 23), easter.cyprian);

    let new_year = concordance
        .month_boundaries()
        .find(|equivalent| equivalent.cyprian == CyprianDate::new(12, 1, 1))
        .unwrap();
    assert_eq!("2025-03-29", new_year.gregorian.to_string());
}

#[test]
fn extended_concordance_spans_years_without_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = CountingOracle::default();
    let service = ConversionService::new(
        CalendarConfig::new().with_db_path(dir.path().join("cache.db")),
        &oracle,
    );

    let concordance = ExtendedConcordance::build(&service, 2024, 2025).unwrap();
    assert_eq!(366 + 365, concordance.equivalents.len());
    for pair in concordance.equivalents.windows(2) {
        assert_eq!(pair[0].gregorian + Days::new(1), pair[1].gregorian);
        assert!(pair[0].cyprian < pair[1].cyprian);
    }
    assert!(oracle.calls.get() > 0);

    // The cache now covers 2025, so listing it again is read-only.
    oracle.calls.set(0);
    let again = ExtendedConcordance::build(&service, 2025, 2025).unwrap();
    assert_eq!(0, oracle.calls.get());
    assert_eq!(concordance.equivalents[366..], again.equivalents[..]);
}

#[test]
fn extended_concordance_rejects_reversed_range() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());

    assert!(matches!(
        ExtendedConcordance::build(&service, 2026, 2025),
        Err(ConversionError::InconsistentState(_))
    ));
}

fn service(dir: &Path) -> ConversionService<MeeusEphemeris> {
    ConversionService::with_config(CalendarConfig::new().with_db_path(dir.join("cache.db")))
}

/// Meeus oracle that counts how often it is consulted.
#[derive(Default)]
struct CountingOracle {
    calls: Cell<usize>,
}

impl EphemerisOracle for CountingOracle {
    fn next_new_moon(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, EphemerisError> {
        self.calls.set(self.calls.get() + 1);
        MeeusEphemeris.next_new_moon(after)
    }

    fn vernal_equinox(&self, year: i32) -> Result<DateTime<Utc>, EphemerisError> {
        self.calls.set(self.calls.get() + 1);
        MeeusEphemeris.vernal_equinox(year)
    }
}
