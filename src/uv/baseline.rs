//! Stations, baselines and their projection onto the (u,v) plane.

use itertools::Itertools;
use marlu::{XyzGeodetic, ENH, UVW};
use vec1::Vec1;

/// A point in the (u,v) plane. Units are metres for geometric coordinates
/// and radians⁻¹ once divided by a wavelength.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UV {
    pub u: f64,
    pub v: f64,
}

impl UV {
    pub fn scaled(self, factor: f64) -> UV {
        UV {
            u: self.u * factor,
            v: self.v * factor,
        }
    }

    pub fn length(self) -> f64 {
        self.u.hypot(self.v)
    }
}

/// An interferometer station.
#[derive(Debug, Clone)]
pub struct Station {
    pub name: String,

    /// Position relative to the array reference in the local equatorial
    /// frame \[metres\].
    pub xyz: XyzGeodetic,
}

impl Station {
    /// Create a station from East, North and Height offsets \[metres\] at an
    /// array latitude.
    pub fn from_enh(name: &str, east: f64, north: f64, height: f64, latitude_rad: f64) -> Station {
        Station {
            name: name.to_string(),
            xyz: ENH {
                e: east,
                n: north,
                h: height,
            }
            .to_xyz(latitude_rad),
        }
    }
}

/// A pair of stations.
#[derive(Debug, Clone)]
pub struct BaseLine {
    /// e.g. "UT1-UT3".
    pub name: String,
    pub station1: String,
    pub station2: String,

    /// `station2 - station1` \[metres\].
    pub xyz: XyzGeodetic,
}

impl BaseLine {
    pub fn new(station1: &Station, station2: &Station) -> BaseLine {
        BaseLine {
            name: format!("{}-{}", station1.name, station2.name),
            station1: station1.name.clone(),
            station2: station2.name.clone(),
            xyz: XyzGeodetic {
                x: station2.xyz.x - station1.xyz.x,
                y: station2.xyz.y - station1.xyz.y,
                z: station2.xyz.z - station1.xyz.z,
            },
        }
    }

    /// Every pair of stations, in configuration order (1-2, 1-3, ..., 2-3,
    /// ...).
    pub fn all_pairs(stations: &Vec1<Station>) -> Vec<BaseLine> {
        stations
            .iter()
            .tuple_combinations()
            .map(|(s1, s2)| BaseLine::new(s1, s2))
            .collect()
    }

    /// The baseline length \[metres\].
    pub fn length(&self) -> f64 {
        (self.xyz.x.powi(2) + self.xyz.y.powi(2) + self.xyz.z.powi(2)).sqrt()
    }

    /// Project the baseline for a target at hour angle `ha` and declination
    /// `dec`, given as their sines and cosines so callers can reuse them
    /// across baselines.
    #[inline]
    pub fn project(&self, s_ha: f64, c_ha: f64, s_dec: f64, c_dec: f64) -> UV {
        let UVW { u, v, .. } = UVW::from_xyz_inner(self.xyz, s_ha, c_ha, s_dec, c_dec);
        UV { u, v }
    }
}

/// The longest baseline length \[metres\], 0 if there are none.
pub fn max_baseline_length(baselines: &[BaseLine]) -> f64 {
    baselines.iter().map(BaseLine::length).fold(0.0, f64::max)
}
