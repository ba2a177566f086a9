//! Distance math for venue search.

/// Kilometres per degree of latitude (and of longitude at the equator)
pub const KM_PER_DEGREE: f64 = 111.0;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance at which a radius match bottoms out at the minimum confidence
const CONFIDENCE_FALLOFF_KM: f64 = 50.0;
const MIN_CONFIDENCE: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 1.0;

/// Lat/lng rectangle used by the bounds query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Box around a point that contains every position within `radius_km`.
    ///
    /// Longitude span widens with latitude; near the poles it covers the full circle.
    pub fn around(latitude: f64, longitude: f64, radius_km: f64) -> Self {
        let lat_delta = radius_km / KM_PER_DEGREE;
        let cos_lat = latitude.to_radians().cos().abs();
        let lng_delta = if cos_lat < 1e-6 {
            180.0
        } else {
            (radius_km / (KM_PER_DEGREE * cos_lat)).min(180.0)
        };

        Self {
            min_lat: (latitude - lat_delta).max(-90.0),
            max_lat: (latitude + lat_delta).min(90.0),
            min_lng: (longitude - lng_delta).max(-180.0),
            max_lng: (longitude + lng_delta).min(180.0),
        }
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lng..=self.max_lng).contains(&longitude)
    }
}

/// Great-circle distance in kilometres
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Confidence for a venue `distance_km` away from the query point
pub fn match_confidence(distance_km: f64) -> f64 {
    if distance_km.is_nan() {
        return MIN_CONFIDENCE;
    }
    (1.0 - distance_km / CONFIDENCE_FALLOFF_KM).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}
