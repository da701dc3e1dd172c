//! Great-circle distances between places

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula, in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS-84 coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Haversine distance to `other` in kilometers
    #[must_use]
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        distance_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Haversine great-circle distance in kilometers.
///
/// The endpoints are put in a canonical order first so that
/// `distance_km(p, q) == distance_km(q, p)` holds bit for bit; the product of
/// the two latitude cosines is otherwise evaluated in argument order.
#[must_use]
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let ((lat1, lng1), (lat2, lng2)) = if (lat1, lng1) <= (lat2, lng2) {
        ((lat1, lng1), (lat2, lng2))
    } else {
        ((lat2, lng2), (lat1, lng1))
    };

    haversine::distance(
        haversine::Location {
            latitude: lat1,
            longitude: lng1,
        },
        haversine::Location {
            latitude: lat2,
            longitude: lng2,
        },
        haversine::Units::Kilometers,
    )
}

/// Round a kilometer value to two decimals for storage
#[must_use]
pub fn round_km(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}
