//! Sun and Moon rise, set and twilight events.

use log::{debug, trace};

use super::{
    ephemeris::{altitude, moon_illumination, moon_position, sun_position, SUN_RISE_SET_ALTITUDE},
    sidereal::SIDEREAL_DAY,
    TimeConverter,
};
use crate::{error::EphemerisError, ranges::Range};

/// Altitude scan step when looking for events \[days\] (10 minutes).
const SCAN_STEP: f64 = 10.0 / 1440.0;

/// Events are refined until bracketed to within this \[days\] (1 second).
const REFINE_TOLERANCE: f64 = 1.0 / 86_400.0;

/// The base event set is replicated at these offsets \[sidereal days\].
const MIRROR_OFFSETS: [f64; 3] = [-1.0, 1.0, 2.0];

/// Sun altitude thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Twilight {
    /// Sun rise and set.
    Horizon,
    Civil,
    Nautical,
    Astronomical,
}

impl Twilight {
    pub const ALL: [Twilight; 4] = [
        Twilight::Horizon,
        Twilight::Civil,
        Twilight::Nautical,
        Twilight::Astronomical,
    ];

    /// The Sun's altitude defining this twilight \[degrees\].
    pub fn sun_altitude(self) -> f64 {
        match self {
            Twilight::Horizon => SUN_RISE_SET_ALTITUDE,
            Twilight::Civil => -6.0,
            Twilight::Nautical => -12.0,
            Twilight::Astronomical => -18.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The Sun rises through the given threshold (dawn, for twilights).
    SunRise(Twilight),
    /// The Sun sets through the given threshold (dusk, for twilights).
    SunSet(Twilight),
    MoonRise,
    MoonSet,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlmanacEvent {
    pub jd: f64,
    pub kind: EventKind,
}

/// Sun and Moon events, each list sorted ascending by JD.
#[derive(Debug, Clone, Default)]
pub struct Almanac {
    pub sun: Vec<AlmanacEvent>,
    pub moon: Vec<AlmanacEvent>,
}

/// Scan `[start, end]` for sign changes of `f`, refining each by bisection.
/// Returns the crossing dates and whether `f` was increasing there.
fn find_crossings<F>(start: f64, end: f64, f: F) -> Result<Vec<(f64, bool)>, EphemerisError>
where
    F: Fn(f64) -> Result<f64, EphemerisError>,
{
    let mut crossings = vec![];
    let num_steps = ((end - start) / SCAN_STEP).ceil() as usize;
    let mut jd_a = start;
    let mut f_a = f(jd_a)?;
    for i in 1..=num_steps {
        let jd_b = (start + i as f64 * SCAN_STEP).min(end);
        let f_b = f(jd_b)?;
        if (f_a < 0.0) != (f_b < 0.0) {
            let rising = f_b >= 0.0;
            let (mut lo, mut hi) = (jd_a, jd_b);
            while hi - lo > REFINE_TOLERANCE {
                let mid = 0.5 * (lo + hi);
                if (f(mid)? >= 0.0) == rising {
                    hi = mid;
                } else {
                    lo = mid;
                }
            }
            crossings.push((0.5 * (lo + hi), rising));
        }
        jd_a = jd_b;
        f_a = f_b;
    }
    Ok(crossings)
}

/// Append copies of the events shifted by [`MIRROR_OFFSETS`] sidereal days,
/// then sort.
fn mirror(events: &mut Vec<AlmanacEvent>) {
    let base = events.clone();
    for offset in MIRROR_OFFSETS {
        events.extend(base.iter().map(|e| AlmanacEvent {
            jd: e.jd + offset * SIDEREAL_DAY,
            kind: e.kind,
        }));
    }
    events.sort_by(|a, b| a.jd.total_cmp(&b.jd));
}

pub(super) fn compute_almanac(time: &TimeConverter) -> Result<Almanac, EphemerisError> {
    let start = time.jd_midnight() - 0.5;
    let end = time.jd_midnight() + 0.5;
    let latitude = time.site().position.latitude_rad;

    let mut sun = vec![];
    for twilight in Twilight::ALL {
        let threshold = twilight.sun_altitude().to_radians();
        let crossings = find_crossings(start, end, |jd| {
            Ok(altitude(sun_position(jd)?, time.lst_rad(jd), latitude) - threshold)
        })?;
        sun.extend(crossings.into_iter().map(|(jd, rising)| AlmanacEvent {
            jd,
            kind: if rising {
                EventKind::SunRise(twilight)
            } else {
                EventKind::SunSet(twilight)
            },
        }));
    }

    let mut moon: Vec<AlmanacEvent> = find_crossings(start, end, |jd| {
        let position = moon_position(jd)?;
        Ok(altitude(position.radec, time.lst_rad(jd), latitude)
            - position.rise_set_altitude().to_radians())
    })?
    .into_iter()
    .map(|(jd, rising)| AlmanacEvent {
        jd,
        kind: if rising {
            EventKind::MoonRise
        } else {
            EventKind::MoonSet
        },
    })
    .collect();

    debug!(
        "Almanac around JD {:.4}: {} sun events, {} moon events",
        time.jd_midnight(),
        sun.len(),
        moon.len()
    );
    for e in sun.iter().chain(moon.iter()) {
        trace!("{:?} at JD {:.6}", e.kind, e.jd);
    }

    mirror(&mut sun);
    mirror(&mut moon);
    Ok(Almanac { sun, moon })
}

impl TimeConverter {
    /// Moon-up JD ranges overlapping `[jd_lower - 12h, jd_upper + 12h]`,
    /// clipped to that window. Each moon rise is paired with the event that
    /// immediately follows it, assumed to be the matching set; a rise with no
    /// following event is taken to last until the end of the window.
    pub fn find_moon_rise_set(&self, almanac: &Almanac, jd_lower: f64, jd_upper: f64) -> Vec<Range> {
        let window = Range::new(jd_lower - 0.5, jd_upper + 0.5);
        almanac
            .moon
            .iter()
            .enumerate()
            .filter(|(_, e)| e.kind == EventKind::MoonRise)
            .map(|(i, rise)| {
                let set = almanac.moon.get(i + 1).map_or(window.max, |e| e.jd);
                Range::new(rise.jd, set)
            })
            .filter(|r| r.overlaps(&window))
            .map(|r| Range::new(r.min.max(window.min), r.max.min(window.max)))
            .collect()
    }

    /// The largest Moon illumination found by sampling the start, middle and
    /// end of each range. This is an upper bound over the samples, not the
    /// true peak.
    pub fn max_moon_illum(&self, moon_ranges: &[Range]) -> Result<f64, EphemerisError> {
        let mut max_illum: f64 = 0.0;
        for r in moon_ranges {
            for jd in [r.min, r.centre(), r.max] {
                max_illum = max_illum.max(moon_illumination(jd)?);
            }
        }
        Ok(max_illum)
    }

    /// JD ranges during which the Sun is below the given twilight, built by
    /// pairing every dusk with the following dawn. If the Sun never crosses
    /// the threshold, the whole extended frame (LST -12 h to 36 h) is either
    /// night or not, depending on the Sun's altitude at midnight.
    pub fn night_ranges(
        &self,
        almanac: &Almanac,
        twilight: Twilight,
    ) -> Result<Vec<Range>, EphemerisError> {
        let events: Vec<&AlmanacEvent> = almanac
            .sun
            .iter()
            .filter(|e| matches!(e.kind, EventKind::SunRise(t) | EventKind::SunSet(t) if t == twilight))
            .collect();

        if events.is_empty() {
            let always_dark = self.sun_altitude(self.jd_midnight())? < twilight.sun_altitude();
            return Ok(if always_dark {
                vec![Range::new(
                    self.jd_lst0() - 0.5 * SIDEREAL_DAY,
                    self.jd_lst0() + 1.5 * SIDEREAL_DAY,
                )]
            } else {
                vec![]
            });
        }

        let mut nights = vec![];
        for (i, dusk) in events.iter().enumerate() {
            if dusk.kind != EventKind::SunSet(twilight) {
                continue;
            }
            if let Some(dawn) = events[i + 1..]
                .iter()
                .find(|e| e.kind == EventKind::SunRise(twilight))
            {
                nights.push(Range::new(dusk.jd, dawn.jd));
            }
        }
        Ok(nights)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::Site;

    fn paranal_night() -> TimeConverter {
        let site = Site::new("Paranal", -70.40498688, -24.62743941, 2681.0, Some(-4.0));
        TimeConverter::define_date(site, 2024, 3, 15).unwrap()
    }

    fn base_event(almanac: &Almanac, time: &TimeConverter, kind: EventKind) -> f64 {
        almanac
            .sun
            .iter()
            .find(|e| e.kind == kind && (e.jd - time.jd_midnight()).abs() < 0.5)
            .map(|e| e.jd)
            .unwrap()
    }

    #[test]
    fn test_sun_events_bracket_midnight() {
        let time = paranal_night();
        let almanac = time.almanac().unwrap();

        let order = [
            EventKind::SunSet(Twilight::Horizon),
            EventKind::SunSet(Twilight::Civil),
            EventKind::SunSet(Twilight::Nautical),
            EventKind::SunSet(Twilight::Astronomical),
        ];
        let dusks: Vec<f64> = order
            .iter()
            .map(|&k| base_event(&almanac, &time, k))
            .collect();
        assert!(dusks.windows(2).all(|w| w[0] < w[1]));
        assert!(dusks[3] < time.jd_midnight());

        let dawn = base_event(&almanac, &time, EventKind::SunRise(Twilight::Astronomical));
        let sunrise = base_event(&almanac, &time, EventKind::SunRise(Twilight::Horizon));
        assert!(time.jd_midnight() < dawn && dawn < sunrise);

        // The events really are where the Sun crosses the thresholds.
        assert_abs_diff_eq!(time.sun_altitude(dusks[0]).unwrap(), -0.833, epsilon = 0.02);
        assert_abs_diff_eq!(time.sun_altitude(dawn).unwrap(), -18.0, epsilon = 0.02);
    }

    #[test]
    fn test_events_are_mirrored_and_sorted() {
        let time = paranal_night();
        let almanac = time.almanac().unwrap();
        assert_eq!(almanac.sun.len() % 4, 0);
        assert_eq!(almanac.moon.len() % 4, 0);
        assert!(almanac.sun.windows(2).all(|w| w[0].jd <= w[1].jd));
        assert!(almanac.moon.windows(2).all(|w| w[0].jd <= w[1].jd));

        let sunset = base_event(&almanac, &time, EventKind::SunSet(Twilight::Horizon));
        for offset in MIRROR_OFFSETS {
            let shifted = sunset + offset * SIDEREAL_DAY;
            assert!(almanac
                .sun
                .iter()
                .any(|e| e.kind == EventKind::SunSet(Twilight::Horizon)
                    && (e.jd - shifted).abs() < 1e-9));
        }
    }

    #[test]
    fn test_night_ranges() {
        let time = paranal_night();
        let almanac = time.almanac().unwrap();
        let nights = time.night_ranges(&almanac, Twilight::Astronomical).unwrap();
        let tonight = nights
            .iter()
            .find(|r| r.contains(time.jd_midnight(), 0.0))
            .unwrap();
        // Roughly nine hours of astronomical darkness in March at Paranal.
        assert!(tonight.length() > 0.3 && tonight.length() < 0.45, "{tonight:?}");
        assert!(nights.windows(2).all(|w| w[0].max < w[1].min));
    }

    #[test]
    fn test_find_moon_rise_set_pairs_and_clips() {
        let time = paranal_night();
        let event = |jd, kind| AlmanacEvent { jd, kind };
        let almanac = Almanac {
            sun: vec![],
            moon: vec![
                event(99.0, EventKind::MoonRise),
                event(99.2, EventKind::MoonSet),
                event(100.1, EventKind::MoonRise),
                event(100.6, EventKind::MoonSet),
                event(101.3, EventKind::MoonRise),
                event(101.7, EventKind::MoonSet),
                event(102.4, EventKind::MoonRise),
            ],
        };

        let ranges = time.find_moon_rise_set(&almanac, 100.2, 101.0);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0], Range::new(100.1, 100.6));
        // Clipped at jd_upper + 12h.
        assert_eq!(ranges[1], Range::new(101.3, 101.5));

        // A trailing rise lasts until the end of the window.
        let ranges = time.find_moon_rise_set(&almanac, 102.0, 102.2);
        assert_eq!(
            ranges,
            vec![Range::new(101.5, 101.7), Range::new(102.4, 102.7)]
        );
    }

    #[test]
    fn test_max_moon_illumination() {
        let time = paranal_night();
        assert_eq!(time.max_moon_illum(&[]).unwrap(), 0.0);

        let almanac = time.almanac().unwrap();
        let up = time.find_moon_rise_set(
            &almanac,
            time.jd_midnight() - 0.5,
            time.jd_midnight() + 0.5,
        );
        let illum = time.max_moon_illum(&up).unwrap();
        assert!((0.0..=1.0).contains(&illum));
        // First quarter is on 2024 March 17, so the Moon is a few days short
        // of half lit.
        if !up.is_empty() {
            assert!(illum > 0.2 && illum < 0.8, "{illum}");
        }
    }
}
