//! When is a target observable?
//!
//! Each constraint (target elevation, darkness) is turned into a set of
//! disjoint hour-angle ranges; the observable windows are where all of them
//! hold at once.

use log::debug;
use marlu::RADec;

use crate::{
    diagnostics::{Diagnostics, Phase},
    error::EphemerisError,
    ranges::{intersect_ranges, sort_ranges, union, Range},
    time::{sidereal::HOURS_TO_RAD, Almanac, TimeConverter, Twilight},
    Target,
};

#[derive(Debug, Clone, Copy)]
pub struct ObservabilityConstraints {
    /// The lowest usable target elevation \[degrees\].
    pub min_elevation_deg: f64,

    /// If set, only observe while the Sun is below this twilight.
    pub night: Option<Twilight>,
}

impl Default for ObservabilityConstraints {
    fn default() -> Self {
        ObservabilityConstraints {
            min_elevation_deg: 30.0,
            night: Some(Twilight::Astronomical),
        }
    }
}

/// Per-target observability, produced once per (observation, target) and
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct StarData {
    pub name: String,

    /// Right ascension precessed to the night \[hours\].
    pub precessed_ra: f64,

    /// Declination precessed to the night \[degrees\].
    pub precessed_dec: f64,

    /// The hour angle at which the target rises above the minimum elevation
    /// \[hours\]; it sets at `+ha_elev`. `None` if it never gets that high,
    /// 12 if it never goes lower.
    pub ha_elev: Option<f64>,

    /// Hour-angle windows (ascending, disjoint) satisfying every constraint.
    /// `None` if there are none.
    pub observable_ha: Option<Vec<Range>>,

    /// JD of the target's meridian transit (HA = 0) in this night's frame.
    pub transit_jd: f64,

    /// Night JD ranges used as the darkness constraint.
    pub night_jd: Vec<Range>,

    /// Upper bound on the Moon's illumination while it is up during the
    /// observable windows (or the night, if there are none).
    pub max_moon_illum: f64,
}

impl StarData {
    /// The smallest and largest observable hour angles.
    pub fn ha_bounds(&self) -> Option<(f64, f64)> {
        let ranges = self.observable_ha.as_ref()?;
        let min = ranges.iter().map(|r| r.min).fold(f64::INFINITY, f64::min);
        let max = ranges.iter().map(|r| r.max).fold(f64::NEG_INFINITY, f64::max);
        if min <= max {
            Some((min, max))
        } else {
            None
        }
    }
}

/// Hour-angle half-width \[hours\] of the time a target at `dec_rad` spends
/// above `min_elevation_rad` as seen from `latitude_rad`.
pub fn ha_for_elevation(dec_rad: f64, latitude_rad: f64, min_elevation_rad: f64) -> Option<f64> {
    let (s_lat, c_lat) = latitude_rad.sin_cos();
    let (s_dec, c_dec) = dec_rad.sin_cos();
    let denominator = c_lat * c_dec;
    if denominator.abs() < 1e-12 {
        // At a pole (of the sky or the Earth) the elevation never changes.
        return if (s_lat * s_dec).asin() >= min_elevation_rad {
            Some(12.0)
        } else {
            None
        };
    }

    let cos_h0 = (min_elevation_rad.sin() - s_lat * s_dec) / denominator;
    if cos_h0 <= -1.0 {
        Some(12.0)
    } else if cos_h0 >= 1.0 {
        None
    } else {
        Some(cos_h0.acos() / HOURS_TO_RAD)
    }
}

/// Computes [`StarData`] for the targets of one night.
pub struct ObservabilityService<'a> {
    time: &'a TimeConverter,
    constraints: ObservabilityConstraints,
    almanac: Almanac,
    night_jd: Vec<Range>,
}

impl<'a> ObservabilityService<'a> {
    pub fn new(
        time: &'a TimeConverter,
        constraints: ObservabilityConstraints,
    ) -> Result<ObservabilityService<'a>, EphemerisError> {
        let almanac = time.almanac()?;
        let night_jd = match constraints.night {
            Some(twilight) => time.night_ranges(&almanac, twilight)?,
            None => vec![],
        };
        Ok(ObservabilityService {
            time,
            constraints,
            almanac,
            night_jd,
        })
    }

    pub fn almanac(&self) -> &Almanac {
        &self.almanac
    }

    pub fn star_data(&self, target: &Target) -> Result<(StarData, Diagnostics), EphemerisError> {
        let mut diagnostics = Diagnostics::default();
        let precessed: RADec = self.time.precess(target.radec_j2000())?;
        let ra = precessed.ra / HOURS_TO_RAD;
        let latitude = self.time.site().position.latitude_rad;

        let mut constraint_sets: Vec<Vec<Range>> = vec![];

        let ha_elev = ha_for_elevation(
            precessed.dec,
            latitude,
            self.constraints.min_elevation_deg.to_radians(),
        );
        constraint_sets.push(match ha_elev {
            Some(h) => vec![Range::new(-h, h)],
            None => vec![],
        });

        if self.constraints.night.is_some() {
            let mut night_ha: Vec<Range> = self
                .night_jd
                .iter()
                .filter_map(|&jd| self.time.convert_jd_to_ha_range(jd, ra))
                .collect();
            sort_ranges(&mut night_ha);
            union(&mut night_ha);
            constraint_sets.push(night_ha);
        }

        let n_valid = constraint_sets.len();
        let all: Vec<Range> = constraint_sets.into_iter().flatten().collect();
        let observable = intersect_ranges(&all, n_valid, Range::new);
        debug!(
            "{}: RA {ra:.4} h, dec {:.4} deg, HA elev {ha_elev:?}, observable {observable:?}",
            target.name,
            precessed.dec.to_degrees()
        );

        let observable_ha = if observable.is_empty() {
            diagnostics.warn(
                Phase::Observability,
                format!("{} is not observable during this night", target.name),
            );
            None
        } else {
            Some(observable)
        };

        let (jd_lower, jd_upper) = match &observable_ha {
            Some(ranges) => (
                self.time.convert_ha_to_jd(ranges[0].min, ra),
                self.time.convert_ha_to_jd(ranges[ranges.len() - 1].max, ra),
            ),
            None => (self.time.jd_midnight() - 0.5, self.time.jd_midnight() + 0.5),
        };
        let moon_up = self
            .time
            .find_moon_rise_set(&self.almanac, jd_lower, jd_upper);
        let max_moon_illum = self.time.max_moon_illum(&moon_up)?;

        Ok((
            StarData {
                name: target.name.clone(),
                precessed_ra: ra,
                precessed_dec: precessed.dec.to_degrees(),
                ha_elev,
                observable_ha,
                transit_jd: self.time.convert_ha_to_jd(0.0, ra),
                night_jd: self.night_jd.clone(),
                max_moon_illum,
            },
            diagnostics,
        ))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::Site;

    fn paranal() -> Site {
        Site::new("Paranal", -70.40498688, -24.62743941, 2681.0, Some(-4.0))
    }

    #[test]
    fn test_ha_for_elevation() {
        let lat = (-24.6_f64).to_radians();
        // A target at the zenith is above 30 deg for a while, but not always.
        let h = ha_for_elevation(lat, lat, 30_f64.to_radians()).unwrap();
        assert!(h > 3.0 && h < 6.0, "{h}");
        // The south celestial pole is always at 24.6 deg.
        assert_eq!(
            ha_for_elevation(-std::f64::consts::FRAC_PI_2, lat, 20_f64.to_radians()),
            Some(12.0)
        );
        assert_eq!(
            ha_for_elevation(-std::f64::consts::FRAC_PI_2, lat, 30_f64.to_radians()),
            None
        );
        // Far northern targets never rise.
        assert_eq!(ha_for_elevation(80_f64.to_radians(), lat, 0.0), None);
        // On the horizon, an equatorial target is up for 12 hours.
        assert_abs_diff_eq!(ha_for_elevation(0.0, lat, 0.0).unwrap(), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_observable_windows_respect_all_constraints() {
        let time = TimeConverter::define_date(paranal(), 2024, 3, 15).unwrap();
        let service = ObservabilityService::new(&time, ObservabilityConstraints::default()).unwrap();

        // Near the local sidereal time at midnight, so it transits in the dark.
        let lst_midnight = time.lst_hours(time.jd_midnight());
        let target = Target {
            name: "transit-at-midnight".to_string(),
            ra_j2000_deg: lst_midnight * 15.0,
            dec_j2000_deg: -30.0,
        };
        let (star, diagnostics) = service.star_data(&target).unwrap();
        assert!(diagnostics.is_empty());
        let observable = star.observable_ha.as_ref().unwrap();
        let ha_elev = star.ha_elev.unwrap();
        for r in observable {
            assert!(r.min >= -ha_elev - 1e-9 && r.max <= ha_elev + 1e-9);
            for ha in [r.min, r.centre(), r.max] {
                let jd = time.convert_ha_to_jd(ha, star.precessed_ra);
                assert!(star.night_jd.iter().any(|n| n.contains(jd, 1e-6)));
            }
        }
        assert!(crate::ranges::contains(observable, 0.0, 0.0));
        assert!((0.0..=1.0).contains(&star.max_moon_illum));
    }

    #[test]
    fn test_daytime_target_is_not_observable() {
        let time = TimeConverter::define_date(paranal(), 2024, 3, 15).unwrap();
        let service = ObservabilityService::new(&time, ObservabilityConstraints::default()).unwrap();
        // Transits at local noon, and at this declination is only up briefly.
        let lst_noon = time.lst_hours(time.jd_midnight() - 0.5);
        let target = Target {
            name: "noon".to_string(),
            ra_j2000_deg: lst_noon * 15.0,
            dec_j2000_deg: 35.0,
        };
        let (star, diagnostics) = service.star_data(&target).unwrap();
        assert!(star.observable_ha.is_none());
        assert!(star.ha_bounds().is_none());
        assert_eq!(diagnostics.warnings().count(), 1);
    }

    #[test]
    fn test_without_night_constraint_only_elevation_matters() {
        let time = TimeConverter::define_date(paranal(), 2024, 3, 15).unwrap();
        let constraints = ObservabilityConstraints {
            min_elevation_deg: 20.0,
            night: None,
        };
        let service = ObservabilityService::new(&time, constraints).unwrap();
        let target = Target {
            name: "anything".to_string(),
            ra_j2000_deg: 10.0,
            dec_j2000_deg: -60.0,
        };
        let (star, _) = service.star_data(&target).unwrap();
        let h = star.ha_elev.unwrap();
        let (min, max) = star.ha_bounds().unwrap();
        assert_abs_diff_eq!(min, -h);
        assert_abs_diff_eq!(max, h);
    }
}
