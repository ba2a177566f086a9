use chrono::{DateTime, Duration, Utc};
use regatta_core::AppError;
use serde::{Deserialize, Serialize};

/// Metadata older than this should be refreshed
pub const STALE_AFTER_HOURS: i64 = 24;

/// Change in sea level (metres per step) below which the tide counts as slack
pub const SLACK_THRESHOLD_M: f64 = 0.05;

/// Geographic location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub name: Option<String>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            name: None,
        }
    }
}

/// 16-point compass direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinal {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "NNE")]
    NorthNorthEast,
    #[serde(rename = "NE")]
    NorthEast,
    #[serde(rename = "ENE")]
    EastNorthEast,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "ESE")]
    EastSouthEast,
    #[serde(rename = "SE")]
    SouthEast,
    #[serde(rename = "SSE")]
    SouthSouthEast,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "SSW")]
    SouthSouthWest,
    #[serde(rename = "SW")]
    SouthWest,
    #[serde(rename = "WSW")]
    WestSouthWest,
    #[serde(rename = "W")]
    West,
    #[serde(rename = "WNW")]
    WestNorthWest,
    #[serde(rename = "NW")]
    NorthWest,
    #[serde(rename = "NNW")]
    NorthNorthWest,
}

impl Cardinal {
    /// Clockwise from north
    pub const ALL: [Cardinal; 16] = [
        Self::North,
        Self::NorthNorthEast,
        Self::NorthEast,
        Self::EastNorthEast,
        Self::East,
        Self::EastSouthEast,
        Self::SouthEast,
        Self::SouthSouthEast,
        Self::South,
        Self::SouthSouthWest,
        Self::SouthWest,
        Self::WestSouthWest,
        Self::West,
        Self::WestNorthWest,
        Self::NorthWest,
        Self::NorthNorthWest,
    ];

    /// Nearest compass point for a bearing in degrees. Any real value is accepted.
    pub fn from_degrees(degrees: f64) -> Self {
        let sector = (degrees.rem_euclid(360.0) / 22.5).round() as usize;
        Self::ALL[sector % 16]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::North => "N",
            Self::NorthNorthEast => "NNE",
            Self::NorthEast => "NE",
            Self::EastNorthEast => "ENE",
            Self::East => "E",
            Self::EastSouthEast => "ESE",
            Self::SouthEast => "SE",
            Self::SouthSouthEast => "SSE",
            Self::South => "S",
            Self::SouthSouthWest => "SSW",
            Self::SouthWest => "SW",
            Self::WestSouthWest => "WSW",
            Self::West => "W",
            Self::WestNorthWest => "WNW",
            Self::NorthWest => "NW",
            Self::NorthNorthWest => "NNW",
        }
    }
}

impl std::fmt::Display for Cardinal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Tide phase at the event time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TideState {
    Flooding,
    Ebbing,
    Slack,
    High,
    Low,
}

impl TideState {
    /// Classify `current` against the neighbouring sea-level readings.
    ///
    /// A turning point is high or low water; otherwise the size and sign of
    /// the change decide between slack, flooding and ebbing.
    pub fn derive(previous: Option<f64>, current: f64, next: Option<f64>) -> Self {
        let rise_in = previous.map(|p| current - p);
        let rise_out = next.map(|n| n - current);

        match (rise_in, rise_out) {
            (Some(a), Some(b)) if a > 0.0 && b <= 0.0 => return TideState::High,
            (Some(a), Some(b)) if a < 0.0 && b >= 0.0 => return TideState::Low,
            _ => {}
        }

        let change = rise_out.or(rise_in).unwrap_or(0.0);
        if change.abs() < SLACK_THRESHOLD_M {
            TideState::Slack
        } else if change > 0.0 {
            TideState::Flooding
        } else {
            TideState::Ebbing
        }
    }
}

/// Forecast region, used to pick a forecast model and reported with the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    AsiaPacific,
    NorthAmerica,
    Europe,
    Global,
}

impl Region {
    pub fn tag(&self) -> &'static str {
        match self {
            Region::AsiaPacific => "asia-pacific",
            Region::NorthAmerica => "north-america",
            Region::Europe => "europe",
            Region::Global => "global",
        }
    }
}

/// Wind at the event, speeds in whole knots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindSummary {
    pub direction: Cardinal,
    pub speed_min: u32,
    pub speed_max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TideSummary {
    pub state: TideState,
    /// Metres above mean sea level, one decimal
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Cardinal>,
}

/// Conditions expected at a race start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherMetadata {
    pub wind: WindSummary,
    #[serde(default)]
    pub tide: Option<TideSummary>,
    pub fetched_at: DateTime<Utc>,
    pub provider: String,
    pub region: Region,
    /// 0.0..=1.0, lower for longer lead times
    pub confidence: f64,
}

impl WeatherMetadata {
    /// True once more than 24 hours have passed since the fetch
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.is_older_than(now, Duration::hours(STALE_AFTER_HOURS))
    }

    pub fn is_older_than(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.fetched_at > max_age
    }
}

/// Forecast lookup errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Forecast API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::Network(e) if e.is_timeout() => "Weather request timed out.",
            WeatherError::Network(_) => "Unable to reach the weather service.",
            WeatherError::Api { status, .. } if *status >= 500 => {
                "The weather service is having problems. Try again later."
            }
            WeatherError::Api { .. } => "The weather service rejected the request.",
            WeatherError::Parse(_) => "Received unexpected data from the weather service.",
            WeatherError::InvalidUrl(_) => "The weather service address is misconfigured.",
        }
    }
}

impl From<WeatherError> for AppError {
    fn from(e: WeatherError) -> Self {
        use regatta_core::{NetworkError, ReqwestErrorExt};
        match e {
            WeatherError::Network(inner) => AppError::Network(inner.into_network_error()),
            WeatherError::Api { status, .. } if status >= 500 => {
                AppError::Weather(regatta_core::WeatherError::ServiceUnavailable)
            }
            WeatherError::Api { status, message } => {
                AppError::Weather(regatta_core::WeatherError::ApiError(format!("{status}: {message}")))
            }
            WeatherError::Parse(msg) => AppError::Network(NetworkError::InvalidResponse(msg)),
            WeatherError::InvalidUrl(msg) => AppError::Weather(regatta_core::WeatherError::ApiError(msg)),
        }
    }
}
