//! Error types for each fallible layer of the planner.
//!
//! Only genuinely fatal conditions live here. Recoverable problems (no
//! observable hour angles, too many samples, ...) are reported as
//! [`crate::diagnostics::Diagnostic`]s on the result, and cancellation is an
//! absent result rather than an error.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EphemerisError {
    #[error("Cannot compute an ephemeris for a non-finite Julian date ({0})")]
    NonFiniteDate(f64),
}

#[derive(Error, Debug)]
pub enum TimeError {
    #[error("Invalid observation date {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u8, day: u8 },

    #[error(transparent)]
    Ephemeris(#[from] EphemerisError),
}

#[derive(Error, Debug)]
pub enum UVCoverageError {
    #[error("The instrument spectral mode is undefined; cannot compute UV coverage")]
    UndefinedSpectralMode,

    #[error("Invalid spectral mode '{name}': wavelengths must satisfy 0 < min <= central <= max (got {min}, {central}, {max})")]
    InvalidSpectralMode {
        name: String,
        min: f64,
        central: f64,
        max: f64,
    },

    #[error("Invalid sampling period {0} s; it must be positive")]
    InvalidSamplingPeriod(f64),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Couldn't read config file {file}: {err}")]
    Io {
        file: PathBuf,
        err: std::io::Error,
    },

    #[error("Couldn't parse config file {file}: {err}")]
    Parse {
        file: PathBuf,
        err: toml::de::Error,
    },

    #[error("Couldn't parse date '{0}'; expected YYYY-MM-DD")]
    BadDate(String),

    #[error("At least two stations are required to form a baseline (got {0})")]
    TooFewStations(usize),

    #[error("Station '{0}' is defined more than once")]
    DuplicateStation(String),

    #[error("No targets were specified")]
    NoTargets,

    #[error("No observation date; give one with --date or as `date` in the config file")]
    MissingDate,
}

/// Everything that can go wrong while planning an observation.
#[derive(Error, Debug)]
pub enum UvPlanError {
    #[error(transparent)]
    Time(#[from] TimeError),

    #[error(transparent)]
    Ephemeris(#[from] EphemerisError),

    #[error(transparent)]
    UVCoverage(#[from] UVCoverageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Couldn't write the report: {0}")]
    Io(#[from] std::io::Error),
}
