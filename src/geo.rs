use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::EARTH_RADIUS_M;
use crate::error::CoordinateError;

/// A WGS84 point in signed decimal degrees, longitude first.
///
/// [`GeoCoordinate::new`] and deserialization both reject non-finite or
/// out-of-range values. The fields stay public for reading; code building a
/// literal directly bypasses the check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct GeoCoordinate {
    pub lon: f64,
    pub lat: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lon: f64,
    lat: f64,
}

impl TryFrom<RawCoordinate> for GeoCoordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        GeoCoordinate::new(raw.lon, raw.lat).ok_or(CoordinateError::OutOfRange {
            lon: raw.lon,
            lat: raw.lat,
        })
    }
}

impl GeoCoordinate {
    pub fn new(lon: f64, lat: f64) -> Option<Self> {
        let valid = lon.is_finite()
            && lat.is_finite()
            && (-180.0..=180.0).contains(&lon)
            && (-90.0..=90.0).contains(&lat);
        valid.then_some(Self { lon, lat })
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_m(&self, other: &GeoCoordinate) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.lon - self.lon).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }
}

impl fmt::Display for GeoCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lon={:.6} lat={:.6}", self.lon, self.lat)
    }
}
