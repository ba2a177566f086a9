//! Open-Meteo forecast and marine client.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, DurationRound, NaiveDateTime, TimeDelta, Utc};
use regatta_core::WeatherConfig;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::instrument;

use crate::types::WeatherError;

const FORECAST_API_BASE: &str = "https://api.open-meteo.com";
const MARINE_API_BASE: &str = "https://marine-api.open-meteo.com";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const PROVIDER_NAME: &str = "open-meteo";

/// Hours fetched either side of the event, so tide trend can be read
const WINDOW_HOURS: i64 = 3;

/// One forecast lookup
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub model: String,
    pub around: DateTime<Utc>,
}

/// One hourly forecast step. Wind speeds are in knots.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPoint {
    pub time: DateTime<Utc>,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub wind_gusts: Option<f64>,
    pub sea_level: Option<f64>,
    pub current_velocity: Option<f64>,
    pub current_direction: Option<f64>,
}

/// One hour of the marine timeline
#[derive(Debug, Clone, PartialEq)]
pub struct SeaLevelReading {
    pub time: DateTime<Utc>,
    pub height: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSeries {
    pub provider: String,
    /// Ascending by time
    pub points: Vec<ForecastPoint>,
    /// Ascending by time. Includes hours the wind forecast left out.
    pub sea_levels: Vec<SeaLevelReading>,
}

impl ForecastSeries {
    /// Series whose tide readings are the points' own sea levels
    pub fn new(provider: impl Into<String>, points: Vec<ForecastPoint>) -> Self {
        let sea_levels = points
            .iter()
            .map(|p| SeaLevelReading {
                time: p.time,
                height: p.sea_level,
            })
            .collect();
        Self {
            provider: provider.into(),
            points,
            sea_levels,
        }
    }
}

/// Anything that can answer a forecast query
pub trait ForecastSource: Send + Sync {
    fn fetch_forecast(
        &self,
        query: &ForecastQuery,
    ) -> impl Future<Output = Result<ForecastSeries, WeatherError>> + Send;
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: ForecastHourly,
}

#[derive(Debug, Deserialize)]
struct ForecastHourly {
    time: Vec<String>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_10m: Vec<Option<f64>>,
    #[serde(default)]
    wind_gusts_10m: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct MarineResponse {
    hourly: MarineHourly,
}

#[derive(Debug, Deserialize)]
struct MarineHourly {
    time: Vec<String>,
    #[serde(default)]
    sea_level_height_msl: Vec<Option<f64>>,
    #[serde(default)]
    ocean_current_velocity: Vec<Option<f64>>,
    #[serde(default)]
    ocean_current_direction: Vec<Option<f64>>,
}

fn at<T: Copy>(values: &[Option<T>], i: usize) -> Option<T> {
    values.get(i).copied().flatten()
}

/// Open-Meteo timestamps with `timezone=GMT`, e.g. `2026-10-24T05:00`
fn parse_hour(value: &str) -> Result<DateTime<Utc>, WeatherError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .map(|t| t.and_utc())
        .map_err(|e| WeatherError::Parse(format!("bad timestamp {value:?}: {e}")))
}

fn format_hour(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M").to_string()
}

/// Weather provider backed by the Open-Meteo HTTP APIs
#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    forecast_url: String,
    marine_url: String,
}

impl WeatherProvider {
    pub fn new() -> Result<Self, WeatherError> {
        Self::with_base_urls(FORECAST_API_BASE, MARINE_API_BASE)
    }

    pub fn from_config(config: &WeatherConfig) -> Result<Self, WeatherError> {
        Self::with_base_urls(&config.forecast_url, &config.marine_url)
    }

    pub fn with_base_urls(forecast_url: &str, marine_url: &str) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            forecast_url: forecast_url.trim_end_matches('/').to_string(),
            marine_url: marine_url.trim_end_matches('/').to_string(),
        })
    }

    fn window(query: &ForecastQuery) -> (String, String) {
        let hour = query
            .around
            .duration_trunc(TimeDelta::hours(1))
            .unwrap_or(query.around);
        (
            format_hour(hour - TimeDelta::hours(WINDOW_HOURS)),
            format_hour(hour + TimeDelta::hours(WINDOW_HOURS)),
        )
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, WeatherError> {
        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| WeatherError::Parse(format!("JSON parse error: {}", e)))
        } else {
            Err(WeatherError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }

    /// Hourly wind in knots around the query time
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_wind(&self, query: &ForecastQuery) -> Result<Vec<ForecastPoint>, WeatherError> {
        let (start, end) = Self::window(query);
        let url = format!("{}/v1/forecast", self.forecast_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", query.latitude.to_string()),
                ("longitude", query.longitude.to_string()),
                ("hourly", "wind_speed_10m,wind_direction_10m,wind_gusts_10m".to_string()),
                ("wind_speed_unit", "kn".to_string()),
                ("timezone", "GMT".to_string()),
                ("models", query.model.clone()),
                ("start_hour", start),
                ("end_hour", end),
            ])
            .send()
            .await?;

        let body: ForecastResponse = Self::handle_response(response).await?;
        let hourly = body.hourly;

        let mut points = Vec::with_capacity(hourly.time.len());
        for (i, time) in hourly.time.iter().enumerate() {
            // Hours without both speed and direction are useless for a summary
            let (Some(wind_speed), Some(wind_direction)) =
                (at(&hourly.wind_speed_10m, i), at(&hourly.wind_direction_10m, i))
            else {
                continue;
            };
            points.push(ForecastPoint {
                time: parse_hour(time)?,
                wind_speed,
                wind_direction,
                wind_gusts: at(&hourly.wind_gusts_10m, i),
                sea_level: None,
                current_velocity: None,
                current_direction: None,
            });
        }

        tracing::debug!("Forecast returned {} usable hours", points.len());
        Ok(points)
    }

    /// Hourly sea level and surface current around the query time
    #[instrument(skip(self), level = "debug")]
    async fn fetch_marine(&self, query: &ForecastQuery) -> Result<MarineHourly, WeatherError> {
        let (start, end) = Self::window(query);
        let url = format!("{}/v1/marine", self.marine_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", query.latitude.to_string()),
                ("longitude", query.longitude.to_string()),
                (
                    "hourly",
                    "sea_level_height_msl,ocean_current_velocity,ocean_current_direction".to_string(),
                ),
                ("timezone", "GMT".to_string()),
                ("start_hour", start),
                ("end_hour", end),
            ])
            .send()
            .await?;

        let body: MarineResponse = Self::handle_response(response).await?;
        Ok(body.hourly)
    }
}

/// Copy marine values onto matching wind hours and return the full sea-level timeline
fn merge_marine(
    points: &mut [ForecastPoint],
    marine: &MarineHourly,
) -> Result<Vec<SeaLevelReading>, WeatherError> {
    let mut readings = Vec::with_capacity(marine.time.len());
    for (i, time) in marine.time.iter().enumerate() {
        let time = parse_hour(time)?;
        let height = at(&marine.sea_level_height_msl, i);
        if let Some(point) = points.iter_mut().find(|p| p.time == time) {
            point.sea_level = height;
            point.current_velocity = at(&marine.ocean_current_velocity, i);
            point.current_direction = at(&marine.ocean_current_direction, i);
        }
        readings.push(SeaLevelReading { time, height });
    }
    readings.sort_by_key(|r| r.time);
    Ok(readings)
}

impl ForecastSource for WeatherProvider {
    async fn fetch_forecast(&self, query: &ForecastQuery) -> Result<ForecastSeries, WeatherError> {
        let (wind, marine) = tokio::join!(self.fetch_wind(query), self.fetch_marine(query));
        let mut points = wind?;

        // Open water and inland venues have no marine data; wind alone is still useful
        let sea_levels = match marine.and_then(|m| merge_marine(&mut points, &m)) {
            Ok(readings) => readings,
            Err(e) => {
                tracing::warn!("Marine data unavailable, continuing without tide: {}", e);
                Vec::new()
            }
        };

        points.sort_by_key(|p| p.time);
        Ok(ForecastSeries {
            provider: format!("{}/{}", PROVIDER_NAME, query.model),
            points,
            sea_levels,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_is_whole_hours_around_event() {
        let query = ForecastQuery {
            latitude: 22.28,
            longitude: 114.17,
            model: "best_match".into(),
            around: Utc.with_ymd_and_hms(2026, 10, 24, 5, 55, 0).unwrap(),
        };
        let (start, end) = WeatherProvider::window(&query);
        assert_eq!(start, "2026-10-24T02:00");
        assert_eq!(end, "2026-10-24T08:00");
    }

    #[test]
    fn test_parse_hour() {
        assert_eq!(
            parse_hour("2026-10-24T05:00").unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 24, 5, 0, 0).unwrap()
        );
        assert!(parse_hour("24/10/2026").is_err());
    }

    #[test]
    fn test_merge_marine_matches_by_time() {
        let t = |h| Utc.with_ymd_and_hms(2026, 10, 24, h, 0, 0).unwrap();
        let mut points: Vec<ForecastPoint> = (4..=6)
            .map(|h| ForecastPoint {
                time: t(h),
                wind_speed: 10.0,
                wind_direction: 90.0,
                wind_gusts: None,
                sea_level: None,
                current_velocity: None,
                current_direction: None,
            })
            .collect();
        let marine = MarineHourly {
            time: vec!["2026-10-24T05:00".into(), "2026-10-24T09:00".into()],
            sea_level_height_msl: vec![Some(1.23), Some(0.5)],
            ocean_current_velocity: vec![Some(0.4)],
            ocean_current_direction: vec![None],
        };

        let readings = merge_marine(&mut points, &marine).unwrap();
        assert_eq!(points[0].sea_level, None);
        assert_eq!(points[1].sea_level, Some(1.23));
        assert_eq!(points[1].current_velocity, Some(0.4));
        assert_eq!(points[1].current_direction, None);
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[1].time, t(9));
    }

    #[test]
    fn test_windless_hour_still_counts_for_tide() {
        let t = |h| Utc.with_ymd_and_hms(2026, 10, 24, h, 0, 0).unwrap();
        let wind_hour = |h| ForecastPoint {
            time: t(h),
            wind_speed: 10.0,
            wind_direction: 90.0,
            wind_gusts: None,
            sea_level: None,
            current_velocity: None,
            current_direction: None,
        };
        // 05:00 had no wind value and was dropped
        let mut points = vec![wind_hour(4), wind_hour(6)];
        let marine = MarineHourly {
            time: vec![
                "2026-10-24T04:00".into(),
                "2026-10-24T05:00".into(),
                "2026-10-24T06:00".into(),
            ],
            sea_level_height_msl: vec![Some(0.2), Some(1.4), Some(1.0)],
            ocean_current_velocity: Vec::new(),
            ocean_current_direction: Vec::new(),
        };

        let sea_levels = merge_marine(&mut points, &marine).unwrap();
        let series = ForecastSeries {
            provider: "open-meteo/best_match".into(),
            points,
            sea_levels,
        };
        let metadata =
            crate::reconciler::summarize(&series, t(6), crate::types::Region::Global, t(0)).unwrap();

        // Ebbing from the 05:00 reading, not flooding from 04:00
        let tide = metadata.tide.unwrap();
        assert_eq!(tide.height, 1.0);
        assert_eq!(tide.state, crate::types::TideState::Ebbing);
    }
}
