//! Venue resolution against the backend.
//!
//! Coordinates go through the `venues_within_radius` RPC. Older backends do
//! not have it, so a missing function falls back to `venues_in_bounds` and
//! distances are computed here.

use regatta_core::VenueConfig;
use regatta_services::{SupabaseClient, SupabaseError};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::geo::{haversine_km, match_confidence, valid_coordinates, BoundingBox};
use crate::types::{Venue, VenueError, VenueMatch, VenueResolution};

const RADIUS_RPC: &str = "venues_within_radius";
const BOUNDS_RPC: &str = "venues_in_bounds";
const VENUES_TABLE: &str = "venues";

pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 50.0;
const MAX_ALTERNATIVES: usize = 3;

/// Fixed confidence for a name match; there is no distance to score
pub const NAME_MATCH_CONFIDENCE: f64 = 0.8;

#[derive(Serialize)]
struct RadiusParams {
    lat: f64,
    lng: f64,
    radius_km: f64,
}

#[derive(Serialize)]
struct BoundsParams {
    min_lat: f64,
    max_lat: f64,
    min_lng: f64,
    max_lng: f64,
}

impl From<BoundingBox> for BoundsParams {
    fn from(b: BoundingBox) -> Self {
        Self {
            min_lat: b.min_lat,
            max_lat: b.max_lat,
            min_lng: b.min_lng,
            max_lng: b.max_lng,
        }
    }
}

#[derive(Deserialize)]
struct RadiusRow {
    #[serde(flatten)]
    venue: Venue,
    distance_km: f64,
}

/// What the user gave us to find a venue with
#[derive(Debug, Clone, PartialEq)]
pub enum VenueQuery {
    Coordinates { latitude: f64, longitude: f64 },
    Name(String),
}

/// Finds venues near a position or by name
#[derive(Debug, Clone)]
pub struct VenueResolver {
    client: SupabaseClient,
    radius_km: f64,
}

impl VenueResolver {
    pub fn new(client: SupabaseClient) -> Self {
        Self {
            client,
            radius_km: DEFAULT_SEARCH_RADIUS_KM,
        }
    }

    pub fn from_config(client: SupabaseClient, config: &VenueConfig) -> Self {
        Self {
            client,
            radius_km: config.search_radius_km,
        }
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    pub async fn resolve(&self, query: &VenueQuery) -> Result<VenueResolution, VenueError> {
        match query {
            VenueQuery::Coordinates {
                latitude,
                longitude,
            } => self.resolve_by_coordinates(*latitude, *longitude).await,
            VenueQuery::Name(name) => self.resolve_by_name(name).await,
        }
    }

    /// Closest venue within the search radius
    #[instrument(skip(self), level = "info")]
    pub async fn resolve_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<VenueResolution, VenueError> {
        if !valid_coordinates(latitude, longitude) {
            return Err(VenueError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }
        if self.radius_km.is_nan() || self.radius_km <= 0.0 {
            return Err(VenueError::InvalidRadius(self.radius_km));
        }

        let mut candidates = match self.nearby_by_radius(latitude, longitude).await {
            Ok(rows) => rows,
            Err(SupabaseError::FunctionNotFound(_)) => {
                tracing::info!("{} unavailable, falling back to {}", RADIUS_RPC, BOUNDS_RPC);
                self.nearby_by_bounds(latitude, longitude).await?
            }
            Err(e) => return Err(e.into()),
        };

        candidates.retain(|(_, d)| *d <= self.radius_km);
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut iter = candidates.into_iter();
        let Some((venue, distance_km)) = iter.next() else {
            tracing::info!("No venue within {} km", self.radius_km);
            return Ok(VenueResolution::not_found(format!(
                "No venue found within {} km of {:.4}, {:.4}",
                self.radius_km, latitude, longitude
            )));
        };

        tracing::info!("Resolved venue {} at {:.1} km", venue.name, distance_km);
        Ok(VenueResolution::Found(VenueMatch {
            venue,
            distance_km: Some(distance_km),
            confidence: match_confidence(distance_km),
            alternatives: iter.take(MAX_ALTERNATIVES).map(|(v, _)| v).collect(),
        }))
    }

    /// First venue whose name or country contains `query`, case-insensitively
    #[instrument(skip(self), level = "info")]
    pub async fn resolve_by_name(&self, query: &str) -> Result<VenueResolution, VenueError> {
        let term = sanitize_term(query);
        if term.is_empty() {
            return Ok(VenueResolution::not_found("Enter a venue name to search"));
        }

        let filter = format!("(name.ilike.*{term}*,country.ilike.*{term}*)");
        let rows: Vec<Venue> = self
            .client
            .select(
                VENUES_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("or", filter),
                    ("limit", (MAX_ALTERNATIVES + 1).to_string()),
                ],
            )
            .await?;

        let mut iter = rows.into_iter();
        let Some(venue) = iter.next() else {
            return Ok(VenueResolution::not_found(format!(
                "No venue matches \"{}\"",
                query.trim()
            )));
        };

        tracing::info!("Matched venue {} by name", venue.name);
        Ok(VenueResolution::Found(VenueMatch {
            venue,
            distance_km: None,
            confidence: NAME_MATCH_CONFIDENCE,
            alternatives: iter.take(MAX_ALTERNATIVES).collect(),
        }))
    }

    async fn nearby_by_radius(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<(Venue, f64)>, SupabaseError> {
        let params = RadiusParams {
            lat: latitude,
            lng: longitude,
            radius_km: self.radius_km,
        };
        let rows: Vec<RadiusRow> = self.client.rpc(RADIUS_RPC, &params).await?;
        tracing::debug!("{} returned {} rows", RADIUS_RPC, rows.len());
        Ok(rows.into_iter().map(|r| (r.venue, r.distance_km)).collect())
    }

    async fn nearby_by_bounds(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<(Venue, f64)>, SupabaseError> {
        let params = BoundsParams::from(BoundingBox::around(latitude, longitude, self.radius_km));
        let rows: Vec<Venue> = self.client.rpc(BOUNDS_RPC, &params).await?;
        tracing::debug!("{} returned {} rows", BOUNDS_RPC, rows.len());
        Ok(rows
            .into_iter()
            .map(|v| {
                let d = haversine_km(latitude, longitude, v.latitude, v.longitude);
                (v, d)
            })
            .collect())
    }
}

/// Strip PostgREST filter syntax and LIKE wildcards, leaving a plain substring
fn sanitize_term(query: &str) -> String {
    query
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '"' | '\\' | '%' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}
