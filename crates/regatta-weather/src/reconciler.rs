//! Race-time weather: picks the forecast hour nearest the start and boils it
//! down to what a crew needs.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use regatta_core::WeatherConfig;
use regatta_services::Race;
use tracing::instrument;

use crate::event_time::race_event_instant;
use crate::provider::{ForecastPoint, ForecastQuery, ForecastSeries, ForecastSource};
use crate::region::select_region;
use crate::types::{
    Cardinal, Location, Region, TideState, TideSummary, WeatherMetadata, WindSummary,
    STALE_AFTER_HOURS,
};

/// Forecasts further out than this are not worth fetching
pub const MAX_LEAD_HOURS: i64 = 240;
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

const LOW_SPEED_FACTOR: f64 = 0.9;
const GUST_FALLBACK_FACTOR: f64 = 1.2;

/// Confidence in a forecast `lead` ahead of the event
pub fn lead_time_confidence(lead: TimeDelta) -> f64 {
    let hours = lead.num_hours();
    match hours {
        h if h <= 24 => 0.9,
        h if h <= 72 => 0.8,
        h if h <= 120 => 0.7,
        _ => 0.6,
    }
}

/// Entry nearest `target`; the earliest wins a tie
pub fn closest_point(points: &[ForecastPoint], target: DateTime<Utc>) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| (p.time - target).abs())
        .map(|(i, _)| i)
}

fn round_knots(value: f64) -> u32 {
    value.max(0.0).round() as u32
}

fn wind_summary(point: &ForecastPoint) -> WindSummary {
    let speed_min = round_knots(LOW_SPEED_FACTOR * point.wind_speed);
    let speed_max = round_knots(
        point
            .wind_gusts
            .unwrap_or(GUST_FALLBACK_FACTOR * point.wind_speed),
    );
    WindSummary {
        direction: Cardinal::from_degrees(point.wind_direction),
        speed_min,
        speed_max: speed_max.max(speed_min),
    }
}

/// Tide at `series.points[index]`, trend read from the adjacent marine hours
fn tide_summary(series: &ForecastSeries, index: usize) -> Option<TideSummary> {
    let point = series.points.get(index)?;
    let height = point.sea_level?;
    let position = series.sea_levels.iter().position(|r| r.time == point.time);
    let reading = |i: Option<usize>| {
        i.and_then(|i| series.sea_levels.get(i))
            .and_then(|r| r.height)
    };
    let previous = reading(position.and_then(|k| k.checked_sub(1)));
    let next = reading(position.map(|k| k + 1));

    let direction = match (point.current_velocity, point.current_direction) {
        (Some(v), Some(d)) if v > 0.0 => Some(Cardinal::from_degrees(d)),
        _ => None,
    };

    Some(TideSummary {
        state: TideState::derive(previous, height, next),
        height: (height * 10.0).round() / 10.0,
        direction,
    })
}

/// Reduce a forecast to race metadata; `None` when the series is empty
pub fn summarize(
    series: &ForecastSeries,
    event_time: DateTime<Utc>,
    region: Region,
    now: DateTime<Utc>,
) -> Option<WeatherMetadata> {
    let index = closest_point(&series.points, event_time)?;
    let point = &series.points[index];

    Some(WeatherMetadata {
        wind: wind_summary(point),
        tide: tide_summary(series, index),
        fetched_at: now,
        provider: series.provider.clone(),
        region,
        confidence: lead_time_confidence(event_time - now),
    })
}

/// Fetches and normalizes race weather from a forecast source
#[derive(Debug, Clone)]
pub struct RaceWeatherService<S> {
    source: S,
    timeout: Duration,
    max_lead: TimeDelta,
    stale_after: TimeDelta,
}

impl<S: ForecastSource> RaceWeatherService<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_lead: TimeDelta::hours(MAX_LEAD_HOURS),
            stale_after: TimeDelta::hours(STALE_AFTER_HOURS),
        }
    }

    pub fn from_config(source: S, config: &WeatherConfig) -> Self {
        Self {
            source,
            timeout: Duration::from_secs(config.timeout_secs),
            max_lead: TimeDelta::hours(i64::from(config.max_lead_hours)),
            stale_after: TimeDelta::hours(i64::from(config.stale_after_hours)),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Whether stored metadata is past this service's refresh age
    pub fn is_stale(&self, metadata: &WeatherMetadata, now: DateTime<Utc>) -> bool {
        metadata.is_older_than(now, self.stale_after)
    }

    /// Expected conditions at `event_time`, or `None` when there is nothing usable
    pub async fn fetch_weather(
        &self,
        location: &Location,
        event_time: DateTime<Utc>,
    ) -> Option<WeatherMetadata> {
        self.fetch_weather_at(Utc::now(), location, event_time).await
    }

    /// `fetch_weather` against an explicit clock
    #[instrument(skip(self, location), fields(lat = location.latitude, lng = location.longitude))]
    pub async fn fetch_weather_at(
        &self,
        now: DateTime<Utc>,
        location: &Location,
        event_time: DateTime<Utc>,
    ) -> Option<WeatherMetadata> {
        let lead = event_time - now;
        if lead < TimeDelta::zero() {
            tracing::debug!("Event already started, skipping forecast");
            return None;
        }
        if lead > self.max_lead {
            tracing::debug!("Event {}h out, beyond forecast range", lead.num_hours());
            return None;
        }

        let rule = select_region(location.latitude, location.longitude);
        let query = ForecastQuery {
            latitude: location.latitude,
            longitude: location.longitude,
            model: rule.model.to_string(),
            around: event_time,
        };

        let series = match tokio::time::timeout(self.timeout, self.source.fetch_forecast(&query)).await
        {
            Ok(Ok(series)) => series,
            Ok(Err(e)) => {
                tracing::error!("Forecast fetch failed: {}", e);
                return None;
            }
            Err(_) => {
                tracing::warn!("Forecast fetch timed out after {:?}", self.timeout);
                return None;
            }
        };

        let metadata = summarize(&series, event_time, rule.region, now);
        match &metadata {
            Some(m) => tracing::info!(
                "Weather for {}: {} {}-{} kn ({})",
                event_time,
                m.wind.direction,
                m.wind.speed_min,
                m.wind.speed_max,
                rule.source
            ),
            None => tracing::warn!("Forecast for {} had no usable hours", event_time),
        }
        metadata
    }

    /// Weather at a race's start. `coordinates` overrides the race's own position.
    pub async fn fetch_race_weather(
        &self,
        race: &Race,
        coordinates: Option<(f64, f64)>,
    ) -> Option<WeatherMetadata> {
        let Some((latitude, longitude)) = coordinates.or_else(|| race.coordinates()) else {
            tracing::debug!("Race {} has no position, skipping weather", race.id);
            return None;
        };

        let event_time = match race_event_instant(race) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("Race {}: {}; using stored start", race.id, e);
                race.start_date
            }
        };

        let location = Location {
            latitude,
            longitude,
            name: Some(race.name.clone()),
        };
        self.fetch_weather(&location, event_time).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::types::WeatherError;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        calls: AtomicUsize,
        points: Vec<ForecastPoint>,
        delay: Option<Duration>,
        fail: bool,
    }

    impl FakeSource {
        fn with_points(points: Vec<ForecastPoint>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                points,
                delay: None,
                fail: false,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ForecastSource for FakeSource {
        async fn fetch_forecast(&self, _query: &ForecastQuery) -> Result<ForecastSeries, WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(WeatherError::Api {
                    status: 500,
                    message: "down".into(),
                });
            }
            Ok(ForecastSeries::new("fake", self.points.clone()))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 20, 0, 0, 0).unwrap()
    }

    fn point(time: DateTime<Utc>, speed: f64, gusts: Option<f64>, sea: Option<f64>) -> ForecastPoint {
        ForecastPoint {
            time,
            wind_speed: speed,
            wind_direction: 45.0,
            wind_gusts: gusts,
            sea_level: sea,
            current_velocity: Some(0.3),
            current_direction: Some(180.0),
        }
    }

    fn hourly_points(event: DateTime<Utc>) -> Vec<ForecastPoint> {
        vec![
            point(event - TimeDelta::hours(1), 8.0, None, Some(0.84)),
            point(event, 10.0, None, Some(1.26)),
            point(event + TimeDelta::hours(1), 12.0, Some(20.0), Some(1.57)),
        ]
    }

    fn harbour() -> Location {
        Location::new(22.28, 114.17)
    }

    #[tokio::test]
    async fn test_outside_window_makes_no_call() {
        let event = now() + TimeDelta::hours(240) + TimeDelta::seconds(1);
        let service = RaceWeatherService::new(FakeSource::with_points(hourly_points(event)));

        assert!(service.fetch_weather_at(now(), &harbour(), event).await.is_none());
        let past = now() - TimeDelta::hours(1);
        assert!(service.fetch_weather_at(now(), &harbour(), past).await.is_none());
        assert_eq!(service.source().calls(), 0);
    }

    #[tokio::test]
    async fn test_window_edges_fetch() {
        for lead in [TimeDelta::zero(), TimeDelta::hours(239), TimeDelta::hours(240)] {
            let event = now() + lead;
            let service = RaceWeatherService::new(FakeSource::with_points(hourly_points(event)));
            assert!(service.fetch_weather_at(now(), &harbour(), event).await.is_some());
            assert_eq!(service.source().calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_normalizes_closest_hour() {
        let event = now() + TimeDelta::hours(48);
        let service = RaceWeatherService::new(FakeSource::with_points(hourly_points(event)));

        let metadata = service
            .fetch_weather_at(now(), &harbour(), event + TimeDelta::minutes(10))
            .await
            .unwrap();

        assert_eq!(metadata.wind.direction, Cardinal::NorthEast);
        assert_eq!(metadata.wind.speed_min, 9);
        assert_eq!(metadata.wind.speed_max, 12);
        let tide = metadata.tide.unwrap();
        assert_eq!(tide.height, 1.3);
        assert_eq!(tide.state, TideState::Flooding);
        assert_eq!(tide.direction, Some(Cardinal::South));
        assert_eq!(metadata.region, Region::AsiaPacific);
        assert_eq!(metadata.confidence, 0.8);
        assert_eq!(metadata.fetched_at, now());
        assert_eq!(metadata.provider, "fake");
    }

    #[tokio::test]
    async fn test_gusts_set_upper_bound() {
        let event = now() + TimeDelta::hours(5);
        let points = hourly_points(event - TimeDelta::hours(1));
        let service = RaceWeatherService::new(FakeSource::with_points(points));

        let metadata = service.fetch_weather_at(now(), &harbour(), event).await.unwrap();
        assert_eq!(metadata.wind.speed_min, 11);
        assert_eq!(metadata.wind.speed_max, 20);
        assert_eq!(metadata.confidence, 0.9);
        // Last reading, still rising
        assert_eq!(metadata.tide.unwrap().state, TideState::Flooding);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let event = now() + TimeDelta::hours(10);
        let mut source = FakeSource::with_points(hourly_points(event));
        source.delay = Some(Duration::from_secs(60));
        let service = RaceWeatherService::new(source);

        let started = tokio::time::Instant::now();
        assert!(service.fetch_weather_at(now(), &harbour(), event).await.is_none());
        assert_eq!(started.elapsed(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[tokio::test]
    async fn test_provider_error_is_none() {
        let event = now() + TimeDelta::hours(10);
        let mut source = FakeSource::with_points(hourly_points(event));
        source.fail = true;
        let service = RaceWeatherService::new(source);
        assert!(service.fetch_weather_at(now(), &harbour(), event).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_series_is_none() {
        let service = RaceWeatherService::new(FakeSource::with_points(Vec::new()));
        let event = now() + TimeDelta::hours(10);
        assert!(service.fetch_weather_at(now(), &harbour(), event).await.is_none());
    }

    #[tokio::test]
    async fn test_race_without_position_is_skipped() {
        let race: Race = serde_json::from_value(serde_json::json!({
            "id": "r1",
            "name": "Autumn Trophy",
            "start_date": "2026-10-24T02:00:00Z"
        }))
        .unwrap();
        let service = RaceWeatherService::new(FakeSource::with_points(Vec::new()));
        assert!(service.fetch_race_weather(&race, None).await.is_none());
        assert_eq!(service.source().calls(), 0);
    }

    #[test]
    fn test_closest_point_prefers_earliest_on_tie() {
        let event = now();
        let points = vec![
            point(event - TimeDelta::minutes(30), 5.0, None, None),
            point(event + TimeDelta::minutes(30), 15.0, None, None),
        ];
        assert_eq!(closest_point(&points, event), Some(0));
        assert_eq!(closest_point(&[], event), None);
    }

    #[test]
    fn test_lead_time_confidence() {
        assert_eq!(lead_time_confidence(TimeDelta::hours(0)), 0.9);
        assert_eq!(lead_time_confidence(TimeDelta::hours(24)), 0.9);
        assert_eq!(lead_time_confidence(TimeDelta::hours(25)), 0.8);
        assert_eq!(lead_time_confidence(TimeDelta::hours(72)), 0.8);
        assert_eq!(lead_time_confidence(TimeDelta::hours(120)), 0.7);
        assert_eq!(lead_time_confidence(TimeDelta::hours(200)), 0.6);
    }

    #[test]
    fn test_from_config() {
        let config = WeatherConfig {
            timeout_secs: 5,
            max_lead_hours: 72,
            ..Default::default()
        };
        let service = RaceWeatherService::from_config(FakeSource::with_points(Vec::new()), &config);
        assert_eq!(service.timeout, Duration::from_secs(5));
        assert_eq!(service.max_lead, TimeDelta::hours(72));
    }

    #[test]
    fn test_configured_staleness() {
        let fetched_at = Utc.with_ymd_and_hms(2026, 10, 20, 8, 0, 0).unwrap();
        let metadata = summarize(
            &ForecastSeries::new("fake", vec![point(fetched_at, 10.0, None, Some(1.0))]),
            fetched_at,
            Region::AsiaPacific,
            fetched_at,
        )
        .unwrap();

        let config = WeatherConfig {
            stale_after_hours: 6,
            ..Default::default()
        };
        let service = RaceWeatherService::from_config(FakeSource::with_points(Vec::new()), &config);
        assert!(!service.is_stale(&metadata, fetched_at + TimeDelta::hours(6)));
        assert!(service.is_stale(&metadata, fetched_at + TimeDelta::hours(7)));

        let defaults = RaceWeatherService::new(FakeSource::with_points(Vec::new()));
        assert!(!defaults.is_stale(&metadata, fetched_at + TimeDelta::hours(7)));
        assert!(defaults.is_stale(&metadata, fetched_at + TimeDelta::hours(25)));
    }
}
