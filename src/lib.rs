//! Observation planning for optical/infrared interferometers.
//!
//! For one site, one night and one target, work out when the target can be
//! observed ([`observability`]) and which spatial frequencies the array
//! samples during those windows ([`uv`]). Times are handled by a
//! [`time::TimeConverter`] shared by every target of the night, and
//! constraints are combined with the interval algebra in [`ranges`].

pub mod cancel;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod observability;
pub mod ranges;
pub mod time;
pub mod uv;

pub use cancel::CancelToken;
pub use error::UvPlanError;

use marlu::{LatLngHeight, RADec};

/// An observatory.
#[derive(Debug, Clone)]
pub struct Site {
    pub name: String,

    /// The Earth position of the array. Longitudes are east positive.
    pub position: LatLngHeight,

    /// Local standard time minus UTC \[hours\]. Used to find local midnight.
    pub utc_offset_hours: f64,
}

impl Site {
    /// Create a site from degrees and metres. Without an explicit UTC offset,
    /// the nominal time zone of the longitude is used.
    pub fn new(
        name: &str,
        longitude_deg: f64,
        latitude_deg: f64,
        height_metres: f64,
        utc_offset_hours: Option<f64>,
    ) -> Site {
        Site {
            name: name.to_string(),
            position: LatLngHeight {
                longitude_rad: longitude_deg.to_radians(),
                latitude_rad: latitude_deg.to_radians(),
                height_metres,
            },
            utc_offset_hours: utc_offset_hours.unwrap_or_else(|| (longitude_deg / 15.0).round()),
        }
    }
}

/// A sky target with catalogue (J2000) coordinates.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub ra_j2000_deg: f64,
    pub dec_j2000_deg: f64,
}

impl Target {
    pub fn radec_j2000(&self) -> RADec {
        RADec::from_degrees(self.ra_j2000_deg, self.dec_j2000_deg)
    }
}
