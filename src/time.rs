//! Kepler time stamps
//!
//! Kepler and K2 time stamps are Barycentric Kepler Julian Dates (BKJD), i.e.
//! `BJD - 2454833` in the TDB time scale.

use chrono::{DateTime, Utc};

/// BJD of the BKJD origin
pub const BKJD_REFERENCE: f64 = 2454833.0;
/// Julian date of the Unix epoch
const UNIX_EPOCH_JD: f64 = 2440587.5;
const SECONDS_PER_DAY: f64 = 86400.0;
/// TT - TAI [s]
const TT_TAI: f64 = 32.184;
/// TAI - UTC [s] from the given Unix time onward
const LEAP_SECONDS: [(i64, f64); 5] = [
    (1136073600, 33.0), // 2006-01-01
    (1230768000, 34.0), // 2009-01-01
    (1341100800, 35.0), // 2012-07-01
    (1435708800, 36.0), // 2015-07-01
    (1483228800, 37.0), // 2017-01-01
];

fn tai_utc(unix_seconds: f64) -> f64 {
    LEAP_SECONDS
        .iter()
        .rev()
        .find(|(since, _)| unix_seconds >= *since as f64)
        .map_or(32.0, |(_, leap)| *leap)
}

/// Converts a BKJD time stamp into UTC
///
/// The TDB - TT difference (< 2ms) is neglected and the result is rounded to the millisecond.
pub fn bkjd_to_utc(bkjd: f64) -> Option<DateTime<Utc>> {
    if !bkjd.is_finite() {
        return None;
    }
    let tdb = (bkjd + BKJD_REFERENCE - UNIX_EPOCH_JD) * SECONDS_PER_DAY;
    let utc = tdb - TT_TAI - tai_utc(tdb);
    DateTime::from_timestamp_millis((utc * 1e3).round() as i64)
}

/// ISO representation of a BKJD time stamp, `YYYY-MM-DD HH:MM:SS.fff` in UTC
pub fn bkjd_to_iso(bkjd: f64) -> Option<String> {
    bkjd_to_utc(bkjd).map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
}
