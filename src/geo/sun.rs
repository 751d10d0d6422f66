//! # Sun Position
//!
//! Solar elevation provider used by derived metrics. The default
//! implementation uses the low-precision almanac formulas (about 0.01°
//! between 1950 and 2050), which is ample for a locator-sized position.

use chrono::{DateTime, Utc};
use std::f64::consts::PI;

/// Degrees to radians conversion factor
const DTOR: f64 = PI / 180.0;

/// Radians to degrees conversion factor
const RTOD: f64 = 180.0 / PI;

/// Julian date of the Unix epoch
const JD_UNIX_EPOCH: f64 = 2_440_587.5;

/// Julian date of J2000.0
const JD_J2000: f64 = 2_451_545.0;

/// Source of solar elevation angles
#[cfg_attr(test, mockall::automock)]
pub trait SunPosition {
    /// Elevation of the sun's center above the horizon in degrees
    fn elevation_deg(&self, at: DateTime<Utc>, lat: f64, lon: f64) -> f64;
}

/// Almanac-based sun position
#[derive(Debug, Clone, Copy, Default)]
pub struct AlmanacSun;

impl SunPosition for AlmanacSun {
    fn elevation_deg(&self, at: DateTime<Utc>, lat: f64, lon: f64) -> f64 {
        let jd = at.timestamp() as f64 / 86_400.0 + JD_UNIX_EPOCH;
        let n = jd - JD_J2000;

        let mean_lon = (280.460 + 0.985_647_4 * n).rem_euclid(360.0);
        let mean_anomaly = ((357.528 + 0.985_600_3 * n).rem_euclid(360.0)) * DTOR;
        let ecliptic_lon = (mean_lon
            + 1.915 * mean_anomaly.sin()
            + 0.020 * (2.0 * mean_anomaly).sin())
            * DTOR;
        let obliquity = (23.439 - 0.000_000_4 * n) * DTOR;

        let right_ascension =
            (obliquity.cos() * ecliptic_lon.sin()).atan2(ecliptic_lon.cos()) * RTOD;
        let declination = (obliquity.sin() * ecliptic_lon.sin()).asin();

        let gmst_hours = (18.697_374_558 + 24.065_709_824_419_08 * n).rem_euclid(24.0);
        let hour_angle = (gmst_hours * 15.0 + lon - right_ascension) * DTOR;

        let lat_rad = lat * DTOR;
        let sin_elevation = lat_rad.sin() * declination.sin()
            + lat_rad.cos() * declination.cos() * hour_angle.cos();

        sin_elevation.clamp(-1.0, 1.0).asin() * RTOD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_equinox_noon_on_equator() {
        let at = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
        let elevation = AlmanacSun.elevation_deg(at, 0.0, 0.0);
        assert!(elevation > 85.0, "got {}", elevation);
    }

    #[test]
    fn test_equinox_midnight_on_equator() {
        let at = Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap();
        let elevation = AlmanacSun.elevation_deg(at, 0.0, 0.0);
        assert!(elevation < -85.0, "got {}", elevation);
    }

    #[test]
    fn test_summer_solstice_noon_at_tropic() {
        // Sun is overhead at the Tropic of Cancer around local noon
        let at = Utc.with_ymd_and_hms(2024, 6, 20, 12, 0, 0).unwrap();
        let elevation = AlmanacSun.elevation_deg(at, 23.44, 0.0);
        assert!(elevation > 87.0, "got {}", elevation);
    }

    #[test]
    fn test_polar_night() {
        let at = Utc.with_ymd_and_hms(2024, 12, 21, 12, 0, 0).unwrap();
        let elevation = AlmanacSun.elevation_deg(at, 80.0, 0.0);
        assert!(elevation < 0.0, "got {}", elevation);
    }
}
