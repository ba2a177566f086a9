//! Race weather for Regatta
//!
//! Fetches wind and tide for a race start from Open-Meteo, picking the
//! forecast model by region, and reduces it to a small metadata record.

pub mod event_time;
pub mod provider;
pub mod reconciler;
pub mod region;
pub mod types;

pub use event_time::{event_instant, local_to_utc, parse_clock_time, race_event_instant, EventTimeError};
pub use provider::{
    ForecastPoint, ForecastQuery, ForecastSeries, ForecastSource, SeaLevelReading, WeatherProvider,
};
pub use reconciler::{closest_point, lead_time_confidence, summarize, RaceWeatherService, MAX_LEAD_HOURS};
pub use region::{select_region, Bounds, RegionRule, GLOBAL_RULE, REGION_TABLE};
pub use types::*;
