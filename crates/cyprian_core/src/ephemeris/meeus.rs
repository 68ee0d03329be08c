//! Bundled oracle based on the series in Meeus, *Astronomical Algorithms*
//! (2nd ed.): chapter 49 for lunar phases and chapter 27 for equinoxes.
//!
//! Results are computed in dynamical time (TT) and shifted to UT with a ΔT
//! polynomial. Accuracy is well under a minute for the supported range,
//! which is far finer than the day granularity the calendar needs.

use super::julian::{decimal_year, from_julian_day, to_julian_day, J2000_JD};
use super::{EphemerisError, EphemerisOracle, EphemerisResult};
use chrono::{DateTime, Datelike, Utc};

/// First year the series are valid for.
pub const MIN_YEAR: i32 = 1000;
/// Last year the series are valid for.
pub const MAX_YEAR: i32 = 3000;

const SYNODIC_MONTH_DAYS: f64 = 29.530_588_861;
/// JDE of the mean new moon with lunation number `k = 0` (2000-01-06).
const LUNATION_ZERO_JDE: f64 = 2_451_550.097_66;

/// Periodic terms for the March equinox: `(A, B, C)` in `A cos(B + C T)`.
const EQUINOX_TERMS: [(f64, f64, f64); 24] = [
    (485.0, 324.96, 1934.136),
    (203.0, 337.23, 32964.467),
    (199.0, 342.08, 20.186),
    (182.0, 27.85, 445267.112),
    (156.0, 73.14, 45036.886),
    (136.0, 171.52, 22518.443),
    (77.0, 222.54, 65928.934),
    (74.0, 296.72, 3034.906),
    (70.0, 243.58, 9037.513),
    (58.0, 119.81, 33718.147),
    (52.0, 297.17, 150.678),
    (50.0, 21.02, 2281.226),
    (45.0, 247.54, 29929.562),
    (44.0, 325.15, 31555.956),
    (29.0, 60.93, 4443.417),
    (18.0, 155.12, 67555.328),
    (17.0, 288.79, 4562.452),
    (16.0, 198.04, 62894.029),
    (14.0, 199.76, 31436.921),
    (12.0, 95.39, 14577.848),
    (12.0, 287.11, 31931.756),
    (12.0, 320.81, 34777.259),
    (9.0, 227.73, 1222.114),
    (8.0, 15.45, 16859.074),
];

/// Planetary arguments for new/full moons: `(coefficient, a0, a1)` where the
/// argument is `a0 + a1 k` (A1 additionally has a `T²` term).
const PLANETARY_TERMS: [(f64, f64, f64); 14] = [
    (0.000_325, 299.77, 0.107_408),
    (0.000_165, 251.88, 0.016_321),
    (0.000_164, 251.83, 26.651_886),
    (0.000_126, 349.42, 36.412_478),
    (0.000_110, 84.66, 18.206_239),
    (0.000_062, 141.74, 53.303_771),
    (0.000_060, 207.14, 2.453_732),
    (0.000_056, 154.84, 7.306_860),
    (0.000_047, 34.52, 27.261_239),
    (0.000_042, 207.19, 0.121_824),
    (0.000_040, 291.34, 1.844_379),
    (0.000_037, 161.72, 24.198_154),
    (0.000_035, 239.56, 25.513_099),
    (0.000_023, 331.55, 3.592_518),
];

/// Stateless Meeus-series ephemeris.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeeusEphemeris;

impl MeeusEphemeris {
    pub fn new() -> Self {
        Self
    }

    /// Julian ephemeris day (TT) of the true new moon for lunation `k`.
    ///
    /// `k` must be integral; `k = 0` is the new moon of 2000-01-06.
    pub fn new_moon_jde(k: f64) -> f64 {
        let t = k / 1236.85;
        let t2 = t * t;
        let t3 = t2 * t;
        let t4 = t3 * t;

        let mean = LUNATION_ZERO_JDE + SYNODIC_MONTH_DAYS * k + 0.000_154_37 * t2
            - 0.000_000_150 * t3
            + 0.000_000_000_73 * t4;

        let e = 1.0 - 0.002_516 * t - 0.000_007_4 * t2;
        let m = (2.5534 + 29.105_356_70 * k - 0.000_001_4 * t2 - 0.000_000_11 * t3).to_radians();
        let mp = (201.5643 + 385.816_935_28 * k + 0.010_758_2 * t2 + 0.000_012_38 * t3
            - 0.000_000_058 * t4)
            .to_radians();
        let f = (160.7108 + 390.670_502_84 * k - 0.001_611_8 * t2 - 0.000_002_27 * t3
            + 0.000_000_011 * t4)
            .to_radians();
        let omega = (124.7746 - 1.563_755_88 * k + 0.002_067_2 * t2 + 0.000_002_15 * t3).to_radians();

        let periodic = -0.407_20 * mp.sin()
            + 0.172_41 * e * m.sin()
            + 0.016_08 * (2.0 * mp).sin()
            + 0.010_39 * (2.0 * f).sin()
            + 0.007_39 * e * (mp - m).sin()
            - 0.005_14 * e * (mp + m).sin()
            + 0.002_08 * e * e * (2.0 * m).sin()
            - 0.001_11 * (mp - 2.0 * f).sin()
            - 0.000_57 * (mp + 2.0 * f).sin()
            + 0.000_56 * e * (2.0 * mp + m).sin()
            - 0.000_42 * (3.0 * mp).sin()
            + 0.000_42 * e * (m + 2.0 * f).sin()
            + 0.000_38 * e * (m - 2.0 * f).sin()
            - 0.000_24 * e * (2.0 * mp - m).sin()
            - 0.000_17 * omega.sin()
            - 0.000_07 * (mp + 2.0 * m).sin()
            + 0.000_04 * (2.0 * mp - 2.0 * f).sin()
            + 0.000_04 * (3.0 * m).sin()
            + 0.000_03 * (mp + m - 2.0 * f).sin()
            + 0.000_03 * (2.0 * mp + 2.0 * f).sin()
            - 0.000_03 * (mp + m + 2.0 * f).sin()
            + 0.000_03 * (mp - m + 2.0 * f).sin()
            - 0.000_02 * (mp - m - 2.0 * f).sin()
            - 0.000_02 * (3.0 * mp + m).sin()
            + 0.000_02 * (4.0 * mp).sin();

        let planetary: f64 = PLANETARY_TERMS
            .iter()
            .enumerate()
            .map(|(idx, &(coefficient, a0, a1))| {
                let mut argument = a0 + a1 * k;
                if idx == 0 {
                    argument -= 0.009_173 * t2;
                }
                coefficient * argument.to_radians().sin()
            })
            .sum();

        mean + periodic + planetary
    }

    /// Julian ephemeris day (TT) of the March equinox of `year`.
    pub fn march_equinox_jde(year: i32) -> f64 {
        let y = (f64::from(year) - 2000.0) / 1000.0;
        let jde0 = 2_451_623.809_84 + 365_242.374_04 * y + 0.051_69 * y * y
            - 0.004_11 * y.powi(3)
            - 0.000_57 * y.powi(4);

        let t = (jde0 - J2000_JD) / 36_525.0;
        let w = (35_999.373 * t - 2.47).to_radians();
        let delta_lambda = 1.0 + 0.0334 * w.cos() + 0.0007 * (2.0 * w).cos();
        let s: f64 = EQUINOX_TERMS
            .iter()
            .map(|&(a, b, c)| a * (b + c * t).to_radians().cos())
            .sum();

        jde0 + 0.000_01 * s / delta_lambda
    }
}

impl EphemerisOracle for MeeusEphemeris {
    fn next_new_moon(&self, after: DateTime<Utc>) -> EphemerisResult<DateTime<Utc>> {
        check_year(after.year())?;
        let jd = to_julian_day(after);

        // Start one lunation early; the true moon can lead the mean one.
        let mut k = ((jd - LUNATION_ZERO_JDE) / SYNODIC_MONTH_DAYS).floor() - 1.0;
        loop {
            let candidate = tt_to_ut(Self::new_moon_jde(k));
            if candidate > jd {
                return from_julian_day(candidate);
            }
            k += 1.0;
        }
    }

    fn vernal_equinox(&self, year: i32) -> EphemerisResult<DateTime<Utc>> {
        check_year(year)?;
        from_julian_day(tt_to_ut(Self::march_equinox_jde(year)))
    }
}

fn check_year(year: i32) -> EphemerisResult<()> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(())
    } else {
        Err(EphemerisError::OutOfRange {
            year,
            min: MIN_YEAR,
            max: MAX_YEAR,
        })
    }
}

fn tt_to_ut(jde: f64) -> f64 {
    jde - delta_t_seconds(decimal_year(jde)) / 86_400.0
}

/// ΔT = TT − UT in seconds (Espenak & Meeus polynomial fits).
fn delta_t_seconds(year: f64) -> f64 {
    let long_term = |y: f64| {
        let u = (y - 1820.0) / 100.0;
        -20.0 + 32.0 * u * u
    };
    if (1986.0..2005.0).contains(&year) {
        let t = year - 2000.0;
        63.86 + 0.3345 * t - 0.060_374 * t.powi(2)
            + 0.001_727_5 * t.powi(3)
            + 0.000_651_814 * t.powi(4)
            + 0.000_023_735_99 * t.powi(5)
    } else if (2005.0..2050.0).contains(&year) {
        let t = year - 2000.0;
        62.92 + 0.322_17 * t + 0.005_589 * t * t
    } else if (2050.0..2150.0).contains(&year) {
        long_term(year) - 0.5628 * (2150.0 - year)
    } else {
        long_term(year)
    }
}
