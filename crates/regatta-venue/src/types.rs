//! Venue data types.

use regatta_core::AppError;
use regatta_services::SupabaseError;
use serde::{Deserialize, Deserializer, Serialize};

/// How much a venue record has been checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Estimated,
    Verified,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A sailing venue as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub id: String,
    pub name: String,
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lng")]
    pub longitude: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub venue_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_unknown")]
    pub data_quality: DataQuality,
}

fn null_as_unknown<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DataQuality, D::Error> {
    Ok(Option::<DataQuality>::deserialize(deserializer)?.unwrap_or_default())
}

/// Best venue for a lookup plus runners-up
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VenueMatch {
    pub venue: Venue,
    /// Distance from the query point; `None` for name lookups
    pub distance_km: Option<f64>,
    /// 0.1..=1.0
    pub confidence: f64,
    /// At most three, best first
    pub alternatives: Vec<Venue>,
}

/// Outcome of a lookup. Not finding anything is a normal answer, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum VenueResolution {
    Found(VenueMatch),
    NotFound { message: String },
}

impl VenueResolution {
    pub fn not_found(message: impl Into<String>) -> Self {
        VenueResolution::NotFound {
            message: message.into(),
        }
    }

    pub fn found(&self) -> Option<&VenueMatch> {
        match self {
            VenueResolution::Found(m) => Some(m),
            VenueResolution::NotFound { .. } => None,
        }
    }
}

/// Venue lookup errors
#[derive(Debug, thiserror::Error)]
pub enum VenueError {
    #[error("Venue lookup failed: {0}")]
    Backend(#[from] SupabaseError),

    #[error("Invalid coordinates: {latitude}, {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("Invalid search radius: {0} km")]
    InvalidRadius(f64),
}

impl VenueError {
    pub fn user_message(&self) -> &'static str {
        match self {
            VenueError::Backend(e) => e.user_message(),
            VenueError::InvalidCoordinates { .. } => "That location is not a valid position.",
            VenueError::InvalidRadius(_) => "The venue search radius must be positive.",
        }
    }
}

impl From<VenueError> for AppError {
    fn from(e: VenueError) -> Self {
        match e {
            VenueError::Backend(inner) => inner.into(),
            VenueError::InvalidCoordinates {
                latitude,
                longitude,
            } => AppError::Venue(regatta_core::VenueError::InvalidCoordinates {
                latitude,
                longitude,
            }),
            VenueError::InvalidRadius(radius) => AppError::Venue(
                regatta_core::VenueError::LookupFailed(format!("invalid radius {radius} km")),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_unknown_quality_is_preserved_as_unknown() {
        let venue: Venue = serde_json::from_value(serde_json::json!({
            "id": "v1",
            "name": "Royal Hong Kong Yacht Club",
            "latitude": 22.2855,
            "longitude": 114.1832,
            "data_quality": "crowdsourced"
        }))
        .unwrap();
        assert_eq!(venue.data_quality, DataQuality::Unknown);
        assert!(venue.country.is_none());

        let venue: Venue = serde_json::from_value(serde_json::json!({
            "id": "v1",
            "name": "Royal Hong Kong Yacht Club",
            "latitude": 22.2855,
            "longitude": 114.1832,
            "data_quality": null
        }))
        .unwrap();
        assert_eq!(venue.data_quality, DataQuality::Unknown);
    }

    #[test]
    fn test_quality_tags() {
        let q: DataQuality = serde_json::from_str("\"verified\"").unwrap();
        assert_eq!(q, DataQuality::Verified);
        let q: DataQuality = serde_json::from_str("\"estimated\"").unwrap();
        assert_eq!(q, DataQuality::Estimated);
    }

    #[test]
    fn test_short_coordinate_names() {
        let venue: Venue = serde_json::from_value(serde_json::json!({
            "id": "v2",
            "name": "Cowes",
            "lat": 50.76,
            "lng": -1.30
        }))
        .unwrap();
        assert_eq!(venue.latitude, 50.76);
        assert_eq!(venue.data_quality, DataQuality::Unknown);
    }

    #[test]
    fn test_app_error_conversion() {
        let err: AppError = VenueError::InvalidCoordinates {
            latitude: 91.0,
            longitude: 0.0,
        }
        .into();
        assert!(matches!(
            err,
            AppError::Venue(regatta_core::VenueError::InvalidCoordinates { .. })
        ));

        let err: AppError = VenueError::Backend(SupabaseError::Unauthorized).into();
        assert!(!err.user_message().is_empty());
    }
}
