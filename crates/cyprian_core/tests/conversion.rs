use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use cyprian_core::{
    BuildTarget, CalendarConfig, ConcordanceBuilder, ConversionError, ConversionService,
    CyprianDate, CyprianDateError, EphemerisError, EphemerisOracle, IntegrityKind,
    MeeusEphemeris,
};
use rusqlite::Connection;
use std::cell::Cell;
use std::path::Path;

#[test]
fn converts_new_years_day_2024_both_ways() {
    let dir = tempfile::tempdir().unwrap();
    let service = meeus_service(dir.path());

    let cyprian = service
        .convert_gregorian_to_cyprian(Utc.with_ymd_and_hms(2024, 1, 1, 15, 30, 0).unwrap(), false)
        .unwrap();
    assert_eq!(CyprianDate::new(10, 10, 21), cyprian);
    assert_eq!("21 Dec T10", cyprian.to_string());

    let gregorian = service
        .convert_cyprian_to_gregorian(CyprianDate::new(10, 10, 21), false)
        .unwrap();
    assert_eq!(at(2024, 1, 1), gregorian);
}

#[test]
fn easter_2025_falls_in_prima_of_t12() {
    let dir = tempfile::tempdir().unwrap();
    let service = meeus_service(dir.path());

    let cyprian = service
        .convert_gregorian_to_cyprian(at(2025, 4, 20), false)
        .unwrap();
    assert_eq!(CyprianDate::new(12, 1, 23), cyprian);
}

#[test]
fn cached_year_round_trips_every_day() {
    let dir = tempfile::tempdir().unwrap();
    let service = meeus_service(dir.path());
    let metadata = service.rebuild(BuildTarget::Gregorian(2024)).unwrap();

    // Cyprian year 11 shares the cached span, so no rebuild happens here.
    let new_year = metadata.this_cyprian_new_year.date_naive();
    for day in new_year.iter_days().take_while(|day| *day < date(2025, 1, 1)) {
        let cyprian = service
            .convert_gregorian_to_cyprian(midnight(day), false)
            .unwrap();
        assert_eq!(11, cyprian.year);
        let back = service.convert_cyprian_to_gregorian(cyprian, false).unwrap();
        assert_eq!(day, back.date_naive());
    }
    assert_eq!(metadata, service.metadata().unwrap());
}

#[test]
fn gregorian_days_round_trip_across_whole_years() {
    let dir = tempfile::tempdir().unwrap();
    let service = meeus_service(dir.path());

    // 2015 and 2016 straddle a year opened by a new moon on the equinox day.
    for year in [2015, 2016, 2024, 2034] {
        let days: Vec<NaiveDate> = date(year, 1, 1)
            .iter_days()
            .take_while(|day| day.year() == year)
            .collect();
        let cyprian: Vec<CyprianDate> = days
            .iter()
            .map(|day| {
                service
                    .convert_gregorian_to_cyprian(midnight(*day), false)
                    .unwrap()
            })
            .collect();

        for (day, cyprian) in days.iter().zip(&cyprian) {
            let back = service.convert_cyprian_to_gregorian(*cyprian, false).unwrap();
            assert_eq!(*day, back.date_naive(), "{day} -> {cyprian}");
        }
    }
}

#[test]
fn cyprian_dates_round_trip_across_whole_years() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let service = ConversionService::with_config(config.clone());
    let builder = ConcordanceBuilder::new(&config, &MeeusEphemeris);

    for cyprian_year in [2, 3, 11, 21] {
        let dates: Vec<CyprianDate> = builder
            .build(BuildTarget::Cyprian(cyprian_year))
            .unwrap()
            .entries
            .iter()
            .map(|entry| entry.cyprian)
            .filter(|cyprian| cyprian.year == cyprian_year)
            .collect();
        assert!(dates.len() >= 353, "T{cyprian_year} has {} days", dates.len());

        let gregorian: Vec<DateTime<Utc>> = dates
            .iter()
            .map(|cyprian| service.convert_cyprian_to_gregorian(*cyprian, false).unwrap())
            .collect();
        for (cyprian, gregorian) in dates.iter().zip(&gregorian) {
            let back = service
                .convert_gregorian_to_cyprian(*gregorian, false)
                .unwrap();
            assert_eq!(*cyprian, back, "{cyprian} -> {gregorian}");
        }
    }
}

#[test]
fn new_years_day_2016_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let service = meeus_service(dir.path());

    let cyprian = service
        .convert_gregorian_to_cyprian(at(2016, 1, 1), false)
        .unwrap();
    assert_eq!(2, cyprian.year);
    assert_eq!(
        at(2016, 1, 1),
        service.convert_cyprian_to_gregorian(cyprian, false).unwrap()
    );
}

#[test]
fn duplicate_metadata_aborts_instead_of_rebuilding() {
    let dir = tempfile::tempdir().unwrap();
    let service = meeus_service(dir.path());
    let before = service.rebuild(BuildTarget::Gregorian(2024)).unwrap();

    let conn = Connection::open(dir.path().join("cache.db")).unwrap();
    conn.execute_batch(
        "DROP INDEX idx_ephemeral_key;
         INSERT INTO ephemeral (key, value) VALUES ('greg_year', '2024');",
    )
    .unwrap();
    drop(conn);

    let err = service
        .convert_gregorian_to_cyprian(at(2024, 1, 1), false)
        .unwrap_err();
    assert_eq!(Some(IntegrityKind::Duplicate), err.integrity_kind());
    let err = service
        .convert_cyprian_to_gregorian(CyprianDate::new(11, 1, 1), false)
        .unwrap_err();
    assert_eq!(Some(IntegrityKind::Duplicate), err.integrity_kind());
    assert!(service.needs_rebuild(Some(2024), None).is_err());

    // Still the corrupt store: nothing was rebuilt behind the caller's back.
    let conn = Connection::open(dir.path().join("cache.db")).unwrap();
    let build_id: String = conn
        .query_row(
            "SELECT value FROM ephemeral WHERE key = 'build_id';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(before.build_id.to_string(), build_id);
    drop(conn);

    let repaired = service
        .convert_gregorian_to_cyprian(at(2024, 1, 1), true)
        .unwrap();
    assert_eq!(CyprianDate::new(10, 10, 21), repaired);
    assert!(!service.needs_rebuild(Some(2024), None).unwrap());
}

#[test]
fn repeated_conversion_reuses_cache() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = CountingOracle::default();
    let service = ConversionService::new(config(dir.path()), &oracle);

    let first = service
        .convert_gregorian_to_cyprian(at(2024, 6, 1), false)
        .unwrap();
    let build_id = service.metadata().unwrap().build_id;
    assert!(oracle.calls.get() > 0);

    oracle.calls.set(0);
    let second = service
        .convert_gregorian_to_cyprian(at(2024, 6, 1), false)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(0, oracle.calls.get());
    assert_eq!(build_id, service.metadata().unwrap().build_id);
}

#[test]
fn forced_rebuild_replaces_cache() {
    let dir = tempfile::tempdir().unwrap();
    let service = meeus_service(dir.path());

    let first = service
        .convert_gregorian_to_cyprian(at(2024, 6, 1), false)
        .unwrap();
    let build_id = service.metadata().unwrap().build_id;

    let forced = service
        .convert_gregorian_to_cyprian(at(2024, 6, 1), true)
        .unwrap();
    assert_eq!(first, forced);
    assert_ne!(build_id, service.metadata().unwrap().build_id);
}

#[test]
fn changing_year_triggers_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let service = meeus_service(dir.path());

    service
        .convert_gregorian_to_cyprian(at(2024, 6, 1), false)
        .unwrap();
    assert!(!service.needs_rebuild(Some(2024), None).unwrap());
    assert!(service.needs_rebuild(Some(2030), None).unwrap());

    service
        .convert_gregorian_to_cyprian(at(2030, 6, 1), false)
        .unwrap();
    let metadata = service.metadata().unwrap();
    assert_eq!(2030, metadata.greg_year);
    assert_eq!(17, metadata.cyprian_year);
}

#[test]
fn cyprian_request_keys_build_on_cyprian_year() {
    let dir = tempfile::tempdir().unwrap();
    let service = meeus_service(dir.path());

    let new_year = service
        .convert_cyprian_to_gregorian(CyprianDate::new(1, 1, 1), false)
        .unwrap();
    assert_eq!(at(2014, 3, 30), new_year);

    let metadata = service.metadata().unwrap();
    assert_eq!(1, metadata.cyprian_year);
    assert_eq!(2014, metadata.greg_year);
}

#[test]
fn failed_rebuild_leaves_previous_cache_intact() {
    let dir = tempfile::tempdir().unwrap();
    let service = meeus_service(dir.path());
    service
        .convert_gregorian_to_cyprian(at(2024, 1, 1), false)
        .unwrap();
    let before = service.metadata().unwrap();

    let failing = FailingOracle::after(100);
    let failing_service = ConversionService::new(config(dir.path()), &failing);
    let err = failing_service
        .convert_gregorian_to_cyprian(at(2030, 1, 1), false)
        .unwrap_err();
    assert!(matches!(
        err,
        ConversionError::Ephemeris(EphemerisError::Unavailable(_))
    ));

    assert_eq!(before, service.metadata().unwrap());
    assert_eq!(
        CyprianDate::new(10, 10, 21),
        service
            .convert_gregorian_to_cyprian(at(2024, 1, 1), false)
            .unwrap()
    );
}

#[test]
fn unsupported_year_surfaces_oracle_range_error() {
    let dir = tempfile::tempdir().unwrap();
    let service = meeus_service(dir.path());

    let err = service
        .convert_gregorian_to_cyprian(at(500, 1, 1), false)
        .unwrap_err();
    assert!(matches!(
        err,
        ConversionError::Ephemeris(EphemerisError::OutOfRange { .. })
    ));
}

#[test]
fn impossible_cyprian_date_is_rejected_before_storage() {
    let dir = tempfile::tempdir().unwrap();
    let service = meeus_service(dir.path());

    let err = service
        .convert_cyprian_to_gregorian(CyprianDate::new(11, 14, 1), false)
        .unwrap_err();
    assert!(matches!(
        err,
        ConversionError::InvalidDate(CyprianDateError::MonthOutOfRange(14))
    ));
    assert!(!dir.path().join("cache.db").exists());
}

#[test]
fn nonexistent_cyprian_date_is_a_lookup_miss() {
    let dir = tempfile::tempdir().unwrap();
    let service = meeus_service(dir.path());

    // T11 has twelve lunations, and Intercalaris of T10 has 29 days.
    let err = service
        .convert_cyprian_to_gregorian(CyprianDate::new(11, 13, 1), false)
        .unwrap_err();
    assert_eq!(Some(IntegrityKind::Empty), err.integrity_kind());

    let err = service
        .convert_cyprian_to_gregorian(CyprianDate::new(10, 13, 30), false)
        .unwrap_err();
    assert_eq!(Some(IntegrityKind::Empty), err.integrity_kind());
}

#[test]
fn epoch_offset_is_configurable() {
    let dir = tempfile::tempdir().unwrap();
    let service = ConversionService::new(
        config(dir.path()).with_epoch_offset(2000),
        MeeusEphemeris,
    );

    let cyprian = service
        .convert_gregorian_to_cyprian(at(2024, 1, 1), false)
        .unwrap();
    assert_eq!(CyprianDate::new(23, 10, 21), cyprian);
}

#[test]
fn concurrent_conversions_of_one_year_agree() {
    let dir = tempfile::tempdir().unwrap();
    let service = meeus_service(dir.path());
    // Create the file up front so both threads only ever open it.
    assert!(service.needs_rebuild(Some(2024), None).unwrap());

    let results: Vec<CyprianDate> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                scope.spawn(|| {
                    service
                        .convert_gregorian_to_cyprian(at(2024, 1, 1), true)
                        .unwrap()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    assert!(results
        .iter()
        .all(|cyprian| *cyprian == CyprianDate::new(10, 10, 21)));
    assert_eq!(2024, service.metadata().unwrap().greg_year);
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

/// Meeus oracle that fails once a fixed number of new-moon queries is spent.
struct FailingOracle {
    remaining: Cell<usize>,
}

impl FailingOracle {
    fn after(calls: usize) -> Self {
        Self {
            remaining: Cell::new(calls),
        }
    }
}

impl EphemerisOracle for FailingOracle {
    fn next_new_moon(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, EphemerisError> {
        let remaining = self.remaining.get();
        if remaining == 0 {
            return Err(EphemerisError::Unavailable("query budget spent".to_string()));
        }
        self.remaining.set(remaining - 1);
        MeeusEphemeris.next_new_moon(after)
    }

    fn vernal_equinox(&self, year: i32) -> Result<DateTime<Utc>, EphemerisError> {
        MeeusEphemeris.vernal_equinox(year)
    }
}

fn config(dir: &Path) -> CalendarConfig {
    CalendarConfig::new().with_db_path(dir.join("cache.db"))
}

fn meeus_service(dir: &Path) -> ConversionService<MeeusEphemeris> {
    ConversionService::with_config(config(dir))
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn midnight(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}
