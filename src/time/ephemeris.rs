//! Low-precision analytic positions of the Sun and Moon, plus precession.
//! Precession comes from the ERFA routines that `marlu` re-exports.
//!
//! The Sun and Moon series are the short forms from the Astronomical
//! Almanac; they are good to ~0.01 deg (Sun) and ~0.3 deg (Moon), which is
//! plenty for rise/set and twilight times at the minute level.

use marlu::{
    erfa::aliases::{eraAnp, eraC2s, eraPmat06, eraRxp, eraS2c},
    RADec,
};

use super::sidereal::J2000;
use crate::error::EphemerisError;

/// The apparent altitude of the Sun's centre at rise and set, including
/// refraction and the solar semi-diameter \[degrees\].
pub const SUN_RISE_SET_ALTITUDE: f64 = -0.833;

#[derive(Debug, Clone, Copy)]
pub struct MoonPosition {
    /// Geocentric equatorial coordinates of date.
    pub radec: RADec,

    /// Horizontal parallax \[radians\].
    pub parallax: f64,
}

impl MoonPosition {
    /// The geocentric altitude at which the Moon's upper limb touches the
    /// horizon (Meeus, eq. 15.1) \[degrees\].
    pub fn rise_set_altitude(&self) -> f64 {
        0.7275 * self.parallax.to_degrees() - 0.5667
    }
}

fn check_date(jd: f64) -> Result<(), EphemerisError> {
    if jd.is_finite() {
        Ok(())
    } else {
        Err(EphemerisError::NonFiniteDate(jd))
    }
}

fn sin_deg(deg: f64) -> f64 {
    deg.to_radians().sin()
}

fn cos_deg(deg: f64) -> f64 {
    deg.to_radians().cos()
}

/// Geocentric position of the Sun.
pub fn sun_position(jd: f64) -> Result<RADec, EphemerisError> {
    check_date(jd)?;
    let n = jd - J2000;
    let mean_longitude = 280.460 + 0.985_647_4 * n;
    let mean_anomaly = 357.528 + 0.985_600_3 * n;
    let ecliptic_longitude =
        mean_longitude + 1.915 * sin_deg(mean_anomaly) + 0.020 * sin_deg(2.0 * mean_anomaly);
    let obliquity = 23.439 - 0.000_000_4 * n;

    let (s_lambda, c_lambda) = ecliptic_longitude.to_radians().sin_cos();
    let (s_eps, c_eps) = obliquity.to_radians().sin_cos();
    Ok(RADec {
        ra: (c_eps * s_lambda).atan2(c_lambda).rem_euclid(std::f64::consts::TAU),
        dec: (s_eps * s_lambda).asin(),
    })
}

/// Geocentric position and parallax of the Moon.
pub fn moon_position(jd: f64) -> Result<MoonPosition, EphemerisError> {
    check_date(jd)?;
    let t = (jd - J2000) / 36_525.0;

    let lambda = 218.32 + 481_267.881 * t + 6.29 * sin_deg(135.0 + 477_198.87 * t)
        - 1.27 * sin_deg(259.3 - 413_335.36 * t)
        + 0.66 * sin_deg(235.7 + 890_534.22 * t)
        + 0.21 * sin_deg(269.9 + 954_397.74 * t)
        - 0.19 * sin_deg(357.5 + 35_999.05 * t)
        - 0.11 * sin_deg(186.5 + 966_404.03 * t);
    let beta = 5.13 * sin_deg(93.3 + 483_202.02 * t) + 0.28 * sin_deg(228.2 + 960_400.89 * t)
        - 0.28 * sin_deg(318.3 + 6_003.15 * t)
        - 0.17 * sin_deg(217.6 - 407_332.21 * t);
    let parallax = 0.9508
        + 0.0518 * cos_deg(135.0 + 477_198.87 * t)
        + 0.0095 * cos_deg(259.3 - 413_335.36 * t)
        + 0.0078 * cos_deg(235.7 + 890_534.22 * t)
        + 0.0028 * cos_deg(269.9 + 954_397.74 * t);

    // Ecliptic to equatorial direction cosines.
    let (s_lambda, c_lambda) = lambda.to_radians().sin_cos();
    let (s_beta, c_beta) = beta.to_radians().sin_cos();
    let l = c_beta * c_lambda;
    let m = 0.9175 * c_beta * s_lambda - 0.3978 * s_beta;
    let n = 0.3978 * c_beta * s_lambda + 0.9175 * s_beta;

    Ok(MoonPosition {
        radec: RADec {
            ra: m.atan2(l).rem_euclid(std::f64::consts::TAU),
            dec: n.clamp(-1.0, 1.0).asin(),
        },
        parallax: parallax.to_radians(),
    })
}

/// Altitude \[radians\] of `radec` seen from `latitude_rad` at local sidereal
/// time `lst_rad`.
pub fn altitude(radec: RADec, lst_rad: f64, latitude_rad: f64) -> f64 {
    let hadec = radec.to_hadec(lst_rad);
    let (s_lat, c_lat) = latitude_rad.sin_cos();
    let (s_dec, c_dec) = hadec.dec.sin_cos();
    (s_lat * s_dec + c_lat * c_dec * hadec.ha.cos())
        .clamp(-1.0, 1.0)
        .asin()
}

/// Angular separation \[radians\] between two positions.
pub fn separation(a: RADec, b: RADec) -> f64 {
    let cos_sep = a.dec.sin() * b.dec.sin() + a.dec.cos() * b.dec.cos() * (a.ra - b.ra).cos();
    cos_sep.clamp(-1.0, 1.0).acos()
}

/// Fraction of the Moon's disc that is illuminated, from the Sun–Moon
/// elongation.
pub fn moon_illumination(jd: f64) -> Result<f64, EphemerisError> {
    let sun = sun_position(jd)?;
    let moon = moon_position(jd)?;
    let elongation = separation(sun, moon.radec);
    Ok(0.5 * (1.0 - elongation.cos()))
}

/// Precess J2000 mean coordinates to the mean equator and equinox of `jd`
/// (IAU 2006 bias-precession matrix).
pub fn precess_j2000(radec: RADec, jd: f64) -> Result<RADec, EphemerisError> {
    check_date(jd)?;
    let rotation_matrix = eraPmat06(jd, 0.0);
    let (ra, dec) = eraC2s(eraRxp(rotation_matrix, eraS2c(radec.ra, radec.dec)));
    Ok(RADec::from_radians(eraAnp(ra), dec))
}
