//! Centralized error types for Regatta.
//!
//! Every crate in the workspace owns a narrow error enum for its own
//! operations; those convert into the hierarchy below so callers at the edge
//! can log the full context and show `user_message()` to the user.

use thiserror::Error;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Venue error: {0}")]
    Venue(#[from] VenueError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Backend(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Venue(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Validation(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }

    /// Whether retrying the same operation later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Network(_)
                | AppError::Backend(BackendError::ServerError { .. })
                | AppError::Weather(WeatherError::Timeout)
        )
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
        }
    }
}

/// Errors reported by the hosted database / RPC backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Not authorized")]
    Unauthorized,

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Remote function unavailable: {0}")]
    FunctionUnavailable(String),

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Request rejected: {status} - {message}")]
    Rejected { status: u16, message: String },
}

impl BackendError {
    pub fn user_message(&self) -> &'static str {
        match self {
            BackendError::Unauthorized => "Your session has expired. Please sign in again.",
            BackendError::NotFound(_) => "The requested record could not be found.",
            BackendError::FunctionUnavailable(_) => {
                "This feature is temporarily unavailable. Please try again later."
            }
            BackendError::ServerError { .. } => {
                "The server is experiencing issues. Please try again later."
            }
            BackendError::Rejected { .. } => "The request was rejected. Please check your input.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
        }
    }
}

/// Venue lookup errors.
#[derive(Debug, Error)]
pub enum VenueError {
    #[error("Venue lookup failed: {0}")]
    LookupFailed(String),

    #[error("Invalid coordinates: {latitude}, {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

impl VenueError {
    pub fn user_message(&self) -> &'static str {
        match self {
            VenueError::LookupFailed(_) => {
                "Couldn't look up venues right now. You can pick a venue manually."
            }
            VenueError::InvalidCoordinates { .. } => {
                "That location doesn't look valid. Please pick a venue manually."
            }
        }
    }
}

/// Weather service errors.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Weather API error: {0}")]
    ApiError(String),

    #[error("Weather request timed out")]
    Timeout,

    #[error("Invalid race time: {0}")]
    InvalidEventTime(String),

    #[error("Service unavailable")]
    ServiceUnavailable,
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::ApiError(_) => "Weather service error. Please try again.",
            WeatherError::Timeout => "Weather is taking too long to load. Please try again.",
            WeatherError::InvalidEventTime(_) => {
                "The race start time couldn't be read. Check the date, time and timezone."
            }
            WeatherError::ServiceUnavailable => {
                "Weather service unavailable. Please try again later."
            }
        }
    }
}

/// Validation failures for data extracted by the AI agent or entered by hand.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid value for {field}: {message}")]
    InvalidField { field: String, message: String },
}

impl ValidationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ValidationError::MissingFields(_) => {
                "Some details are missing. Please fill in the highlighted fields."
            }
            ValidationError::InvalidField { .. } => "Some details look invalid. Please check them.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
