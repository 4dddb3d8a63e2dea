//! Spatial-frequency (u,v) coverage of an array for one target.

pub mod baseline;
pub mod coverage;

pub use baseline::{max_baseline_length, BaseLine, Station, UV};
pub use coverage::{
    compute_uv_points, SpectralMode, UVCoverage, UVCoverageInput, UVCoverageService, VisData,
    VisSynthesis, HA_EPSILON, MAX_HA_POINTS,
};
