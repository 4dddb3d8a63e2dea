//! Sidereal time and angle helpers.

use std::f64::consts::PI;

use hifitime::{Duration, Epoch};
use marlu::precession::get_lmst;

/// Ratio of the sidereal rate to the solar rate (sidereal days per solar
/// day).
pub const SIDEREAL_RATE: f64 = 1.002_737_909_35;

/// The length of one sidereal day \[solar days\].
pub const SIDEREAL_DAY: f64 = 1.0 / SIDEREAL_RATE;

/// JD of the J2000.0 epoch.
pub const J2000: f64 = 2_451_545.0;

pub const HOURS_PER_DAY: f64 = 24.0;

/// Hour angle / right ascension hours to radians.
pub const HOURS_TO_RAD: f64 = PI / 12.0;

/// Wrap hours into `[0, 24)`.
pub(crate) fn wrap_hours(hours: f64) -> f64 {
    let h = hours.rem_euclid(HOURS_PER_DAY);
    // `rem_euclid` can round up to exactly 24 for tiny negative inputs.
    if h >= HOURS_PER_DAY {
        0.0
    } else {
        h
    }
}

/// Wrap hours into `(-12, 12]`, i.e. pick the nearer way around the clock.
pub(crate) fn signed_hours(hours: f64) -> f64 {
    let h = wrap_hours(hours);
    if h > 12.0 {
        h - HOURS_PER_DAY
    } else {
        h
    }
}

/// Local mean sidereal time \[hours, `[0, 24)`\] at the UTC date `jd`, for an
/// east-positive longitude. UT1 is taken to be UTC.
pub fn lmst_hours(jd: f64, longitude_rad: f64) -> f64 {
    let lmst = get_lmst(longitude_rad, Epoch::from_jde_utc(jd), Duration::ZERO);
    wrap_hours(lmst / HOURS_TO_RAD)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_lmst_at_greenwich() {
        // Meeus, Astronomical Algorithms, example 12.a: 1987 April 10, 0h UT
        // has GMST 13h10m46.3668s.
        let expected = 13.0 + 10.0 / 60.0 + 46.3668 / 3600.0;
        assert_abs_diff_eq!(lmst_hours(2_446_895.5, 0.0), expected, epsilon = 1e-5);
    }

    #[test]
    fn test_lmst_later_in_the_day() {
        // Meeus example 12.b: 1987 April 10, 19h21m00s UT has GMST
        // 8h34m57.0896s.
        let jd = 2_446_895.5 + (19.0 + 21.0 / 60.0) / 24.0;
        let expected = 8.0 + 34.0 / 60.0 + 57.0896 / 3600.0;
        assert_abs_diff_eq!(lmst_hours(jd, 0.0), expected, epsilon = 1e-5);
    }

    #[test]
    fn test_wrapping() {
        assert_abs_diff_eq!(wrap_hours(-1.0), 23.0);
        assert_abs_diff_eq!(wrap_hours(49.5), 1.5);
        assert_abs_diff_eq!(signed_hours(23.0), -1.0);
        assert_abs_diff_eq!(signed_hours(12.0), 12.0);
        assert_abs_diff_eq!(signed_hours(-13.0), 11.0);
    }

    #[test]
    fn test_lmst_adds_longitude() {
        let jd = 2_446_895.5;
        let east_90 = lmst_hours(jd, 90_f64.to_radians());
        assert_abs_diff_eq!(east_90, wrap_hours(lmst_hours(jd, 0.0) + 6.0), epsilon = 1e-9);

        // West longitudes wrap into [0, 24) too.
        let west = lmst_hours(jd, (-170_f64).to_radians());
        assert!((0.0..24.0).contains(&west), "{west}");
        assert_abs_diff_eq!(
            signed_hours(west - lmst_hours(jd, 0.0)),
            -170.0 / 15.0,
            epsilon = 1e-9
        );
    }
}
