//! Great-circle distances for nearest-property selection.

use serde::{Deserialize, Serialize};

/// Mean Earth radius (IUGG), meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        distance_meters(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Haversine distance between two points given in degrees.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Closest candidate to `origin` with its distance. Candidates with
/// non-finite coordinates are skipped.
pub fn nearest<'a, T>(
    origin: Coordinates,
    candidates: impl IntoIterator<Item = &'a T>,
    position: impl Fn(&T) -> Coordinates,
) -> Option<(&'a T, f64)>
where
    T: 'a,
{
    candidates
        .into_iter()
        .map(|candidate| (candidate, origin.distance_to(&position(candidate))))
        .filter(|(_, distance)| distance.is_finite())
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
}

#[cfg(test)]
#[path = "tests/geo_tests.rs"]
mod tests;
