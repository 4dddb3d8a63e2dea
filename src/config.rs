//! Observation descriptions read from TOML.
//!
//! ```toml
//! date = "2024-03-15"
//! clock = "utc"
//!
//! [site]
//! name = "Paranal"
//! longitude_deg = -70.40498688
//! latitude_deg = -24.62743941
//! height_m = 2681.0
//!
//! [[stations]]
//! name = "UT1"
//! east = -9.925
//! north = -20.335
//!
//! [[stations]]
//! name = "UT2"
//! east = 14.887
//! north = 30.502
//!
//! [spectral_mode]
//! name = "K"
//! wavelength_min_um = 2.0
//! wavelength_central_um = 2.2
//! wavelength_max_um = 2.4
//!
//! [[targets]]
//! name = "HD 1234"
//! ra_deg = 83.8
//! dec_deg = -40.2
//! ```

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use hifitime::Epoch;
use log::debug;
use serde::Deserialize;
use vec1::Vec1;

use crate::{
    error::ConfigError,
    observability::ObservabilityConstraints,
    time::{TimeRef, Twilight},
    uv::{BaseLine, SpectralMode, Station},
    Site, Target,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    date: Option<String>,
    #[serde(default)]
    clock: ClockFile,
    site: SiteFile,
    stations: Vec<StationFile>,
    spectral_mode: Option<SpectralModeFile>,
    #[serde(default)]
    sampling: SamplingFile,
    #[serde(default)]
    constraints: ConstraintsFile,
    #[serde(default)]
    targets: Vec<TargetFile>,
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum ClockFile {
    #[default]
    Utc,
    Lst,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SiteFile {
    name: String,
    longitude_deg: f64,
    latitude_deg: f64,
    #[serde(default)]
    height_m: f64,
    utc_offset_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StationFile {
    name: String,
    east: f64,
    north: f64,
    #[serde(default)]
    height: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SpectralModeFile {
    name: String,
    wavelength_min_um: f64,
    wavelength_central_um: f64,
    wavelength_max_um: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct SamplingFile {
    period_s: f64,
    acquisition_s: f64,
    uv_max_m: Option<f64>,
    support: bool,
}

impl Default for SamplingFile {
    fn default() -> Self {
        SamplingFile {
            period_s: 900.0,
            acquisition_s: 300.0,
            uv_max_m: None,
            support: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum NightFile {
    Any,
    Horizon,
    Civil,
    Nautical,
    Astronomical,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct ConstraintsFile {
    min_elevation_deg: f64,
    night: NightFile,
}

impl Default for ConstraintsFile {
    fn default() -> Self {
        let defaults = ObservabilityConstraints::default();
        ConstraintsFile {
            min_elevation_deg: defaults.min_elevation_deg,
            night: NightFile::Astronomical,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TargetFile {
    name: String,
    ra_deg: f64,
    dec_deg: f64,
}

/// A validated observation description.
#[derive(Debug, Clone)]
pub struct ObservationConfig {
    pub file: PathBuf,
    pub date: Option<(i32, u8, u8)>,
    pub time_ref: TimeRef,
    pub site: Site,
    pub stations: Vec1<Station>,
    pub baselines: Vec1<BaseLine>,
    pub spectral_mode: Option<SpectralMode>,
    pub sampling_period_s: f64,
    pub acquisition_time_s: f64,
    pub uv_max_m: Option<f64>,
    pub compute_support: bool,
    pub constraints: ObservabilityConstraints,
    pub targets: Vec1<Target>,
}

impl ObservationConfig {
    pub fn load(file: &Path) -> Result<ObservationConfig, ConfigError> {
        let contents = std::fs::read_to_string(file).map_err(|err| ConfigError::Io {
            file: file.to_path_buf(),
            err,
        })?;
        Self::parse(&contents, file)
    }

    /// Parse `contents`; `file` is only used in messages.
    pub fn parse(contents: &str, file: &Path) -> Result<ObservationConfig, ConfigError> {
        let config: ConfigFile = toml::from_str(contents).map_err(|err| ConfigError::Parse {
            file: file.to_path_buf(),
            err,
        })?;
        debug!("Parsed {}: {config:?}", file.display());

        let date = config.date.as_deref().map(parse_date).transpose()?;
        let site = Site::new(
            &config.site.name,
            config.site.longitude_deg,
            config.site.latitude_deg,
            config.site.height_m,
            config.site.utc_offset_hours,
        );

        let mut seen = HashSet::new();
        for s in &config.stations {
            if !seen.insert(s.name.as_str()) {
                return Err(ConfigError::DuplicateStation(s.name.clone()));
            }
        }
        let latitude_rad = site.position.latitude_rad;
        let stations = config
            .stations
            .iter()
            .map(|s| Station::from_enh(&s.name, s.east, s.north, s.height, latitude_rad))
            .collect::<Vec<_>>();
        let stations =
            Vec1::try_from_vec(stations).map_err(|_| ConfigError::TooFewStations(0))?;
        // A single station makes no pairs.
        let baselines = Vec1::try_from_vec(BaseLine::all_pairs(&stations))
            .map_err(|_| ConfigError::TooFewStations(stations.len()))?;

        let targets = config
            .targets
            .into_iter()
            .map(|t| Target {
                name: t.name,
                ra_j2000_deg: t.ra_deg,
                dec_j2000_deg: t.dec_deg,
            })
            .collect::<Vec<_>>();
        let targets = Vec1::try_from_vec(targets).map_err(|_| ConfigError::NoTargets)?;

        let night = match config.constraints.night {
            NightFile::Any => None,
            NightFile::Horizon => Some(Twilight::Horizon),
            NightFile::Civil => Some(Twilight::Civil),
            NightFile::Nautical => Some(Twilight::Nautical),
            NightFile::Astronomical => Some(Twilight::Astronomical),
        };

        Ok(ObservationConfig {
            file: file.to_path_buf(),
            date,
            time_ref: match config.clock {
                ClockFile::Utc => TimeRef::Utc,
                ClockFile::Lst => TimeRef::Lst,
            },
            site,
            stations,
            baselines,
            spectral_mode: config.spectral_mode.map(|m| SpectralMode {
                name: m.name,
                wavelength_min: m.wavelength_min_um * 1e-6,
                wavelength_central: m.wavelength_central_um * 1e-6,
                wavelength_max: m.wavelength_max_um * 1e-6,
            }),
            sampling_period_s: config.sampling.period_s,
            acquisition_time_s: config.sampling.acquisition_s,
            uv_max_m: config.sampling.uv_max_m,
            compute_support: config.sampling.support,
            constraints: ObservabilityConstraints {
                min_elevation_deg: config.constraints.min_elevation_deg,
                night,
            },
            targets,
        })
    }
}

/// Parse a "YYYY-MM-DD" calendar date. The day has to exist, and a time of
/// day other than midnight is rejected.
pub fn parse_date(s: &str) -> Result<(i32, u8, u8), ConfigError> {
    let bad_date = || ConfigError::BadDate(s.to_string());
    // hifitime's parser indexes by character position.
    if !s.is_ascii() {
        return Err(bad_date());
    }
    let epoch = Epoch::from_gregorian_str(s).map_err(|_| bad_date())?;
    match epoch.to_gregorian_utc() {
        (year, month, day, 0, 0, 0, 0) => Ok((year, month, day)),
        _ => Err(bad_date()),
    }
}
