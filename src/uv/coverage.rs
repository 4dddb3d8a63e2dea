//! Sampled (u,v) coverage of a target over its observable hour angles.

use std::{any::Any, sync::Arc, time::Instant};

use hifitime::Epoch;
use log::{debug, trace};
use ndarray::prelude::*;
use rayon::prelude::*;
use vec1::Vec1;

use super::baseline::{max_baseline_length, BaseLine, UV};
use crate::{
    cancel::CancelToken,
    diagnostics::{Diagnostics, Phase},
    error::UVCoverageError,
    observability::StarData,
    ranges::find,
    time::{sidereal::HOURS_TO_RAD, TimeConverter, TimeRef},
};

/// The most hour-angle samples kept per target.
pub const MAX_HA_POINTS: usize = 500;

/// Tolerance when testing hour angles against the observable ranges
/// \[hours\]; one second.
pub const HA_EPSILON: f64 = 1.0 / 3600.0;

/// Hour-angle step of the rise-to-set uv tracks \[hours\].
const UV_SUPPORT_HA_STEP: f64 = 0.1;

/// The wavelength band of an instrument mode. Wavelengths are in metres.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralMode {
    pub name: String,
    pub wavelength_min: f64,
    pub wavelength_central: f64,
    pub wavelength_max: f64,
}

/// Whatever a [`VisSynthesis`] produces. Opaque to this crate.
pub type VisData = Arc<dyn Any + Send + Sync>;

/// Turns a finished coverage into (model) visibilities.
pub trait VisSynthesis {
    /// Returns `None` if no visibilities could be made. Implementations
    /// should poll `token` and give up early if it is cancelled.
    fn synthesize(&self, coverage: &UVCoverage, token: &CancelToken) -> Option<VisData>;
}

/// Everything needed to compute the coverage of one target on one night.
#[derive(Clone, Copy)]
pub struct UVCoverageInput<'a> {
    pub time: &'a TimeConverter,
    pub star: &'a StarData,
    pub baselines: &'a Vec1<BaseLine>,
    pub spectral_mode: Option<&'a SpectralMode>,

    /// Time between the starts of two samples \[seconds\].
    pub sampling_period_s: f64,

    /// Length of one sample \[seconds\]. A sample is only kept if it fits
    /// entirely within one observable window.
    pub acquisition_time_s: f64,

    /// Requested maximum uv extent \[metres\]. Defaults to the longest
    /// baseline.
    pub uv_max_m: Option<f64>,

    /// The clock used for sample dates.
    pub time_ref: TimeRef,

    /// Also compute the rise-to-set tracks of every baseline.
    pub compute_support: bool,
}

/// The result of [`UVCoverageService::compute`]. Arrays are indexed
/// `[baseline, sample]`.
pub struct UVCoverage {
    pub target_name: String,
    pub spectral_mode: SpectralMode,
    pub time_ref: TimeRef,

    /// Baseline names, in array row order.
    pub baselines: Vec<String>,

    /// Maximum uv extent \[metres\].
    pub uv_max_m: f64,

    /// Maximum uv extent at the shortest wavelength \[rad⁻¹\].
    pub uv_max: f64,

    /// Sample hour angles \[hours\].
    pub ha: Vec<f64>,

    /// Sample start dates, in the `time_ref` clock.
    pub dates: Vec<Epoch>,

    /// Rise-to-set tracks \[metres\], if requested and the target rises.
    pub uv_support: Option<Array2<UV>>,

    /// Sampled uv points \[metres\].
    pub uv_m: Array2<UV>,

    /// Sampled uv points at the shortest wavelength \[rad⁻¹\].
    pub uv_wl_min: Array2<UV>,

    /// Sampled uv points at the longest wavelength \[rad⁻¹\].
    pub uv_wl_max: Array2<UV>,

    pub vis_data: Option<VisData>,

    diagnostics: Diagnostics,
}

impl UVCoverage {
    pub fn num_samples(&self) -> usize {
        self.ha.len()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// The metre-unit samples of one baseline.
    pub fn baseline_uv(&self, baseline: usize) -> ArrayView1<'_, UV> {
        self.uv_m.row(baseline)
    }
}

/// Hour-angle samples and their projections.
struct ObservableSamples {
    ha: Vec<f64>,
    dates: Vec<Epoch>,
    uv_m: Array2<UV>,
    uv_wl_min: Array2<UV>,
    uv_wl_max: Array2<UV>,
}

impl ObservableSamples {
    fn empty(num_baselines: usize) -> ObservableSamples {
        ObservableSamples {
            ha: vec![],
            dates: vec![],
            uv_m: Array2::default((num_baselines, 0)),
            uv_wl_min: Array2::default((num_baselines, 0)),
            uv_wl_max: Array2::default((num_baselines, 0)),
        }
    }
}

/// Computes one [`UVCoverage`]. Construct with [`UVCoverageService::prepare`]
/// and run [`UVCoverageService::compute`]; nothing is shared between
/// services.
pub struct UVCoverageService<'a> {
    input: UVCoverageInput<'a>,
    spectral_mode: &'a SpectralMode,

    /// \[hours\]
    ha_step: f64,

    /// \[hours\]
    acquisition: f64,

    /// \[metres\]
    uv_max_m: f64,
}

impl<'a> UVCoverageService<'a> {
    /// Validate the instrument setup and derive the sampling parameters.
    pub fn prepare(input: UVCoverageInput<'a>) -> Result<UVCoverageService<'a>, UVCoverageError> {
        let spectral_mode = input
            .spectral_mode
            .ok_or(UVCoverageError::UndefinedSpectralMode)?;
        if !(spectral_mode.wavelength_min > 0.0
            && spectral_mode.wavelength_min <= spectral_mode.wavelength_central
            && spectral_mode.wavelength_central <= spectral_mode.wavelength_max)
        {
            return Err(UVCoverageError::InvalidSpectralMode {
                name: spectral_mode.name.clone(),
                min: spectral_mode.wavelength_min,
                central: spectral_mode.wavelength_central,
                max: spectral_mode.wavelength_max,
            });
        }
        if !(input.sampling_period_s.is_finite() && input.sampling_period_s > 0.0) {
            return Err(UVCoverageError::InvalidSamplingPeriod(
                input.sampling_period_s,
            ));
        }

        let uv_max_m = input
            .uv_max_m
            .unwrap_or_else(|| max_baseline_length(input.baselines));
        Ok(UVCoverageService {
            input,
            spectral_mode,
            ha_step: input.sampling_period_s / 3600.0,
            acquisition: input.acquisition_time_s / 3600.0,
            uv_max_m,
        })
    }

    /// Maximum uv extent at the shortest wavelength \[rad⁻¹\].
    pub fn uv_max(&self) -> f64 {
        self.uv_max_m / self.spectral_mode.wavelength_min
    }

    /// Run every phase. Returns `None` if `token` is cancelled before the
    /// coverage is complete.
    pub fn compute(
        &self,
        synthesis: Option<&dyn VisSynthesis>,
        token: &CancelToken,
    ) -> Option<UVCoverage> {
        let start = Instant::now();
        let star = self.input.star;
        if token.is_cancelled() {
            debug!("{}: cancelled before UV coverage", star.name);
            return None;
        }
        let mut diagnostics = Diagnostics::default();

        let uv_support = if self.input.compute_support {
            self.compute_uv_support(&mut diagnostics)
        } else {
            None
        };
        if token.is_cancelled() {
            debug!("{}: cancelled after UV support", star.name);
            return None;
        }

        let samples = self.compute_observable_uv(&mut diagnostics, token)?;
        if token.is_cancelled() {
            debug!("{}: cancelled after observable UV", star.name);
            return None;
        }

        let mut coverage = UVCoverage {
            target_name: star.name.clone(),
            spectral_mode: self.spectral_mode.clone(),
            time_ref: self.input.time_ref,
            baselines: self.input.baselines.iter().map(|b| b.name.clone()).collect(),
            uv_max_m: self.uv_max_m,
            uv_max: self.uv_max(),
            ha: samples.ha,
            dates: samples.dates,
            uv_support,
            uv_m: samples.uv_m,
            uv_wl_min: samples.uv_wl_min,
            uv_wl_max: samples.uv_wl_max,
            vis_data: None,
            diagnostics: Diagnostics::default(),
        };

        let vis_data = self.create_vis_data(&coverage, synthesis, &mut diagnostics, token);
        if token.is_cancelled() {
            debug!("{}: cancelled after visibility synthesis", star.name);
            return None;
        }
        coverage.vis_data = vis_data;
        coverage.diagnostics = diagnostics;
        debug!(
            "{}: {} samples on {} baselines in {:?}",
            star.name,
            coverage.num_samples(),
            coverage.baselines.len(),
            start.elapsed()
        );
        Some(coverage)
    }

    /// The track of every baseline from target rise to set, whether or not
    /// it can be observed then.
    fn compute_uv_support(&self, diagnostics: &mut Diagnostics) -> Option<Array2<UV>> {
        let star = self.input.star;
        let ha_elev = match star.ha_elev {
            Some(h) => h,
            None => {
                diagnostics.inform(
                    Phase::UVSupport,
                    format!("{} never rises high enough for uv tracks", star.name),
                );
                return None;
            }
        };

        let num_steps = (2.0 * ha_elev / UV_SUPPORT_HA_STEP + 1e-9).floor() as usize;
        let mut ha: Vec<f64> = (0..=num_steps)
            .map(|i| -ha_elev + i as f64 * UV_SUPPORT_HA_STEP)
            .collect();
        if ha.last().map_or(true, |&last| last < ha_elev - HA_EPSILON) {
            ha.push(ha_elev);
        }

        let baselines = self.input.baselines.as_slice();
        let (s_dec, c_dec) = star.precessed_dec.to_radians().sin_cos();
        let sin_cos_ha: Vec<(f64, f64)> = ha.iter().map(|h| (h * HOURS_TO_RAD).sin_cos()).collect();
        let support = Array2::from_shape_fn((baselines.len(), sin_cos_ha.len()), |(i_bl, i_ha)| {
            let (s_ha, c_ha) = sin_cos_ha[i_ha];
            baselines[i_bl].project(s_ha, c_ha, s_dec, c_dec)
        });
        debug!("{}: uv support of {} points per baseline", star.name, ha.len());
        Some(support)
    }

    /// Sample the observable hour angles and project every baseline at each
    /// sample.
    fn compute_observable_uv(
        &self,
        diagnostics: &mut Diagnostics,
        token: &CancelToken,
    ) -> Option<ObservableSamples> {
        let star = self.input.star;
        let time = self.input.time;
        let baselines = self.input.baselines;

        let ranges = match star.observable_ha.as_deref() {
            Some(ranges) if !ranges.is_empty() => ranges,
            _ => {
                diagnostics.warn(
                    Phase::ObservableUV,
                    format!("{}: no observable HA, so no uv coverage", star.name),
                );
                return Some(ObservableSamples::empty(baselines.len()));
            }
        };
        let (ha_min, ha_max) = star.ha_bounds()?;

        // First pass: which hour angles fit a whole acquisition into one
        // observable window?
        let num_candidates = ((ha_max - ha_min) / self.ha_step + 1e-9).floor() as usize + 1;
        let mut ha_values = Vec::with_capacity(num_candidates.min(MAX_HA_POINTS));
        let mut truncated = false;
        for i in 0..num_candidates {
            let ha = ha_min + i as f64 * self.ha_step;
            let accepted = match (
                find(ranges, ha, HA_EPSILON),
                find(ranges, ha + self.acquisition, HA_EPSILON),
            ) {
                (Some(start), Some(end)) => start == end,
                _ => false,
            };
            if !accepted {
                trace!("{}: rejected HA {ha:.4}", star.name);
                continue;
            }
            if ha_values.len() == MAX_HA_POINTS {
                truncated = true;
                break;
            }
            ha_values.push(ha);
        }
        if truncated {
            diagnostics.warn(
                Phase::ObservableUV,
                format!(
                    "{}: too many HA points; only the first {MAX_HA_POINTS} are used. Increase the sampling period",
                    star.name
                ),
            );
        }
        if ha_values.is_empty() {
            diagnostics.warn(
                Phase::ObservableUV,
                format!(
                    "{}: no HA point fits an acquisition within the observable windows",
                    star.name
                ),
            );
            return Some(ObservableSamples::empty(baselines.len()));
        }

        let dates: Vec<Epoch> = ha_values
            .iter()
            .map(|&ha| {
                time.calendar_date(
                    time.convert_ha_to_jd(ha, star.precessed_ra),
                    self.input.time_ref,
                )
            })
            .collect();

        // Second pass: project.
        let (s_dec, c_dec) = star.precessed_dec.to_radians().sin_cos();
        let sin_cos_ha: Vec<(f64, f64)> = ha_values
            .iter()
            .map(|ha| (ha * HOURS_TO_RAD).sin_cos())
            .collect();
        let per_baseline: Vec<Vec<UV>> = baselines
            .as_slice()
            .par_iter()
            .map(|baseline| {
                if token.is_cancelled() {
                    return None;
                }
                Some(
                    sin_cos_ha
                        .iter()
                        .map(|&(s_ha, c_ha)| baseline.project(s_ha, c_ha, s_dec, c_dec))
                        .collect::<Vec<UV>>(),
                )
            })
            .collect::<Option<_>>()?;

        let uv_m = Array2::from_shape_fn((baselines.len(), ha_values.len()), |(i_bl, i_ha)| {
            per_baseline[i_bl][i_ha]
        });
        let inv_wl_min = 1.0 / self.spectral_mode.wavelength_min;
        let inv_wl_max = 1.0 / self.spectral_mode.wavelength_max;
        Some(ObservableSamples {
            ha: ha_values,
            dates,
            uv_wl_min: uv_m.mapv(|uv| uv.scaled(inv_wl_min)),
            uv_wl_max: uv_m.mapv(|uv| uv.scaled(inv_wl_max)),
            uv_m,
        })
    }

    fn create_vis_data(
        &self,
        coverage: &UVCoverage,
        synthesis: Option<&dyn VisSynthesis>,
        diagnostics: &mut Diagnostics,
        token: &CancelToken,
    ) -> Option<VisData> {
        let synthesis = synthesis?;
        if coverage.num_samples() == 0 {
            debug!("{}: no samples to synthesize", coverage.target_name);
            return None;
        }
        let vis_data = synthesis.synthesize(coverage, token);
        if vis_data.is_none() && !token.is_cancelled() {
            diagnostics.warn(
                Phase::VisSynthesis,
                format!("{}: visibility data unavailable", coverage.target_name),
            );
        }
        vis_data
    }
}

/// The uv point of every baseline at one hour angle, or `None` if `ha` is
/// not observable.
pub fn compute_uv_points(ha: f64, star: &StarData, baselines: &[BaseLine]) -> Option<Vec<UV>> {
    let ranges = star.observable_ha.as_deref()?;
    find(ranges, ha, HA_EPSILON)?;
    let (s_ha, c_ha) = (ha * HOURS_TO_RAD).sin_cos();
    let (s_dec, c_dec) = star.precessed_dec.to_radians().sin_cos();
    Some(
        baselines
            .iter()
            .map(|b| b.project(s_ha, c_ha, s_dec, c_dec))
            .collect(),
    )
}
