//! Venue lookup for Regatta.
//!
//! Resolves a GPS fix or a typed name to a known sailing venue and keeps the
//! user's current selection for the lifetime of a session.

pub mod geo;
pub mod resolver;
pub mod session;
pub mod types;

pub use geo::{haversine_km, match_confidence, BoundingBox};
pub use resolver::{VenueQuery, VenueResolver, DEFAULT_SEARCH_RADIUS_KM, NAME_MATCH_CONFIDENCE};
pub use session::VenueSession;
pub use types::{DataQuality, Venue, VenueError, VenueMatch, VenueResolution};
