//! Conversions between Julian dates, local sidereal time, hour angles and
//! calendar dates for one observing night at one site.

pub mod almanac;
pub mod ephemeris;
pub mod sidereal;

pub use almanac::{Almanac, AlmanacEvent, EventKind, Twilight};
pub use sidereal::{SIDEREAL_DAY, SIDEREAL_RATE};

use hifitime::{Epoch, TimeUnits};
use log::{debug, trace};
use marlu::RADec;

use self::sidereal::{lmst_hours, signed_hours, HOURS_PER_DAY, HOURS_TO_RAD};
use crate::{
    diagnostics::{Diagnostics, Phase},
    error::{EphemerisError, TimeError},
    ranges::Range,
    Site,
};

/// The LST0 search stops once the sidereal time is this close to 00:00:00
/// \[hours\] (1 ms).
const LST0_TOLERANCE: f64 = 1e-3 / 3600.0;

/// Upper bound on the LST0 refinement steps.
const LST0_MAX_ITERATIONS: usize = 10;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Which clock calendar dates are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRef {
    Utc,
    /// Local sidereal time, as a clock face starting on the UTC calendar
    /// day of LST0.
    Lst,
}

/// Site-referenced time conversions for one observing night.
///
/// Establishing LST0 needs an iterative search, so one converter is built per
/// (site, night) and then shared read-only by every target of the
/// observation.
#[derive(Debug, Clone)]
pub struct TimeConverter {
    site: Site,

    /// JD of local midnight (24:00 local time on the requested date).
    jd_midnight: f64,

    /// JD at which the local sidereal time is 00:00:00, nearest to the local
    /// noon preceding `jd_midnight`. All hour-angle conversions are relative
    /// to this date, so LSTs in `[-12, 36]` hours cover the whole night.
    jd_lst0: f64,

    diagnostics: Diagnostics,
}

impl TimeConverter {
    /// Set up conversions for the night starting on the given local date.
    pub fn define_date(
        site: Site,
        year: i32,
        month: u8,
        day: u8,
    ) -> Result<TimeConverter, TimeError> {
        Self::define_date_inner(site, year, month, day, LST0_MAX_ITERATIONS)
    }

    fn define_date_inner(
        site: Site,
        year: i32,
        month: u8,
        day: u8,
        max_lst0_iterations: usize,
    ) -> Result<TimeConverter, TimeError> {
        let start_of_day = Epoch::maybe_from_gregorian_utc(year, month, day, 0, 0, 0, 0)
            .map_err(|_| TimeError::InvalidDate { year, month, day })?;
        let jd_midnight = start_of_day.to_jde_utc_days() + 1.0 - site.utc_offset_hours / HOURS_PER_DAY;

        let mut diagnostics = Diagnostics::default();
        let (jd_lst0, iterations, error) = find_jd_lst0(
            jd_midnight,
            site.position.longitude_rad,
            max_lst0_iterations,
        );
        if error.abs() >= LST0_TOLERANCE {
            diagnostics.warn(
                Phase::DefineDate,
                format!(
                    "LST0 search did not converge after {iterations} iterations (residual {:.3} ms)",
                    error.abs() * 3_600_000.0
                ),
            );
        }
        debug!(
            "{} {year:04}-{month:02}-{day:02}: JD midnight {jd_midnight:.6}, JD LST0 {jd_lst0:.6} ({iterations} iterations)",
            site.name
        );

        Ok(TimeConverter {
            site,
            jd_midnight,
            jd_lst0,
            diagnostics,
        })
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn jd_midnight(&self) -> f64 {
        self.jd_midnight
    }

    pub fn jd_lst0(&self) -> f64 {
        self.jd_lst0
    }

    /// Messages raised while defining the date (e.g. an unconverged LST0).
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Local mean sidereal time at `jd` \[hours, `[0, 24)`\].
    pub fn lst_hours(&self, jd: f64) -> f64 {
        lmst_hours(jd, self.site.position.longitude_rad)
    }

    /// Local sidereal time at `jd` \[radians\].
    pub fn lst_rad(&self, jd: f64) -> f64 {
        self.lst_hours(jd) * HOURS_TO_RAD
    }

    /// Convert an hour angle \[hours\] of a target at (precessed) right
    /// ascension `ra` \[hours\] to a JD. Valid for `ra + ha` in `[-12, 36]`.
    pub fn convert_ha_to_jd(&self, ha: f64, ra: f64) -> f64 {
        let lst = ra + ha;
        self.jd_lst0 + lst / (HOURS_PER_DAY * SIDEREAL_RATE)
    }

    /// The inverse of [`TimeConverter::convert_ha_to_jd`]. No wrapping is
    /// applied; restrict the result to `[-12, 12]` separately if needed.
    pub fn convert_jd_to_ha(&self, jd: f64, ra: f64) -> f64 {
        let lst = (jd - self.jd_lst0) * HOURS_PER_DAY * SIDEREAL_RATE;
        lst - ra
    }

    pub fn convert_ha_to_jd_range(&self, ha: Range, ra: f64) -> Range {
        Range::new(
            self.convert_ha_to_jd(ha.min, ra),
            self.convert_ha_to_jd(ha.max, ra),
        )
    }

    /// Convert a JD range to an hour-angle range. Ranges entirely outside
    /// `[-12, 12]` give `None`; partially overlapping ones are clipped.
    pub fn convert_jd_to_ha_range(&self, jd: Range, ra: f64) -> Option<Range> {
        let min = self.convert_jd_to_ha(jd.min, ra);
        let max = self.convert_jd_to_ha(jd.max, ra);
        if max < -12.0 || min > 12.0 {
            return None;
        }
        Some(Range::new(min.max(-12.0), max.min(12.0)))
    }

    /// Express `jd` as a calendar date in the requested clock.
    ///
    /// UTC dates are rounded to the millisecond. LST dates are a sidereal
    /// clock face: the sidereal time elapsed since LST0, counted from 00:00
    /// on the UTC calendar day of LST0, rolling over to the next day at
    /// 24:00:00 sidereal.
    pub fn calendar_date(&self, jd: f64, time_ref: TimeRef) -> Epoch {
        match time_ref {
            TimeRef::Utc => Epoch::from_jde_utc(jd).round(1.milliseconds()),
            TimeRef::Lst => {
                let lst_millis =
                    ((jd - self.jd_lst0) * SIDEREAL_RATE * MILLIS_PER_DAY as f64).round() as i64;
                // Integer milliseconds make 24:00:00.000 roll over exactly.
                let days = lst_millis.div_euclid(MILLIS_PER_DAY);
                let millis_of_day = lst_millis.rem_euclid(MILLIS_PER_DAY);

                // The calendar day is taken at noon to stay clear of leap
                // seconds and rounding at day boundaries.
                let (ref_year, ref_month, ref_day, ..) =
                    Epoch::from_jde_utc(self.jd_lst0).to_gregorian_utc();
                let ref_noon =
                    Epoch::from_gregorian_utc_hms(ref_year, ref_month, ref_day, 12, 0, 0);
                let (year, month, day, ..) =
                    Epoch::from_jde_utc(ref_noon.to_jde_utc_days() + days as f64)
                        .to_gregorian_utc();

                let hours = (millis_of_day / 3_600_000) as u8;
                let minutes = (millis_of_day / 60_000 % 60) as u8;
                let seconds = (millis_of_day / 1000 % 60) as u8;
                let nanos = (millis_of_day % 1000) as u32 * 1_000_000;
                trace!("JD {jd:.6} -> LST day {days} {hours:02}:{minutes:02}:{seconds:02}");
                Epoch::from_gregorian_utc(year, month, day, hours, minutes, seconds, nanos)
            }
        }
    }

    /// Sun and Moon events around local midnight, replicated one sidereal day
    /// before and one and two sidereal days after so that callers working in
    /// an extended LST frame always find bracketing events.
    pub fn almanac(&self) -> Result<Almanac, EphemerisError> {
        almanac::compute_almanac(self)
    }

    /// Altitude of the Sun \[degrees\] at `jd`.
    pub fn sun_altitude(&self, jd: f64) -> Result<f64, EphemerisError> {
        let sun = ephemeris::sun_position(jd)?;
        Ok(ephemeris::altitude(sun, self.lst_rad(jd), self.site.position.latitude_rad).to_degrees())
    }

    /// Position of a J2000 target precessed to this night.
    pub fn precess(&self, radec_j2000: RADec) -> Result<RADec, EphemerisError> {
        ephemeris::precess_j2000(radec_j2000, self.jd_midnight)
    }
}

/// Iteratively find the JD nearest `jd_midnight - 12h` at which the local
/// sidereal time is 0. Returns the JD, the number of refinement steps taken
/// and the remaining sidereal-time error \[hours\].
fn find_jd_lst0(
    jd_midnight: f64,
    longitude_rad: f64,
    max_iterations: usize,
) -> (f64, usize, f64) {
    let mut jd = jd_midnight - 0.5;
    let mut error = signed_hours(lmst_hours(jd, longitude_rad));
    let mut iterations = 0;
    while error.abs() >= LST0_TOLERANCE && iterations < max_iterations {
        // Step to the nearer wrap of 00:00:00.
        jd -= error / (HOURS_PER_DAY * SIDEREAL_RATE);
        error = signed_hours(lmst_hours(jd, longitude_rad));
        iterations += 1;
    }
    (jd, iterations, error)
}
