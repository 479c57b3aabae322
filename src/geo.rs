//! Distance and coordinate-bucket helpers.

use crate::models::Accommodation;

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres (Haversine).
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Latitude and longitude rounded to two decimals, in hundredths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketKey {
    lat: i64,
    lon: i64,
}

impl BucketKey {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat: (lat * 100.0).round() as i64,
            lon: (lon * 100.0).round() as i64,
        }
    }

    /// `None` for entities without coordinates.
    pub fn of(accommodation: &Accommodation) -> Option<Self> {
        accommodation
            .coordinate()
            .filter(|c| c.is_valid())
            .map(|c| Self::new(c.lat, c.lon))
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2},{:.2}", self.lat as f64 / 100.0, self.lon as f64 / 100.0)
    }
}
