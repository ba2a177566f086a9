use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Hosted database / RPC backend
    pub supabase: SupabaseConfig,

    /// Forecast lookup settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Venue search settings
    #[serde(default)]
    pub venue: VenueConfig,

    /// Strategy planner settings
    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Retry policy for remote calls
    #[serde(default)]
    pub retry: RetrySettings,

    /// AI agent endpoints
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL, e.g. https://xyz.supabase.co
    pub url: String,

    /// Public anon key (optional, can be set via SUPABASE_ANON_KEY)
    pub anon_key: Option<String>,
}

impl SupabaseConfig {
    /// Configured key, falling back to the environment.
    pub fn resolved_anon_key(&self) -> Option<String> {
        self.anon_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("SUPABASE_ANON_KEY").ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Base URL of the forecast API
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    /// Base URL of the marine (tide/current) API
    #[serde(default = "default_marine_url")]
    pub marine_url: String,

    /// Wall-clock limit for one forecast lookup
    #[serde(default = "default_weather_timeout")]
    pub timeout_secs: u64,

    /// Events further out than this are not fetched
    #[serde(default = "default_max_lead_hours")]
    pub max_lead_hours: u32,

    /// Metadata older than this is flagged for refresh
    #[serde(default = "default_stale_hours")]
    pub stale_after_hours: u32,
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com".to_string()
}

fn default_marine_url() -> String {
    "https://marine-api.open-meteo.com".to_string()
}

fn default_weather_timeout() -> u64 {
    15
}

fn default_max_lead_hours() -> u32 {
    240
}

fn default_stale_hours() -> u32 {
    24
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            forecast_url: default_forecast_url(),
            marine_url: default_marine_url(),
            timeout_secs: default_weather_timeout(),
            max_lead_hours: default_max_lead_hours(),
            stale_after_hours: default_stale_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Radius for GPS venue detection
    #[serde(default = "default_radius_km")]
    pub search_radius_km: f64,
}

fn default_radius_km() -> f64 {
    50.0
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            search_radius_km: default_radius_km(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Entries kept per phase in the history view
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    /// Idle window before buffered plan edits are written
    #[serde(default = "default_autosave_idle_ms")]
    pub autosave_idle_ms: u64,
}

fn default_recent_limit() -> usize {
    3
}

fn default_autosave_idle_ms() -> u64 {
    1500
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            recent_limit: default_recent_limit(),
            autosave_idle_ms: default_autosave_idle_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total invocations, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    1.5
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Edge function that extracts race details from free text
    #[serde(default = "default_extraction_function")]
    pub extraction_function: String,
}

fn default_extraction_function() -> String {
    "race-extraction".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            extraction_function: default_extraction_function(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("regatta");

        Self {
            config_dir,
            supabase: SupabaseConfig {
                url: "http://localhost:54321".to_string(), // supabase local dev default
                anon_key: std::env::var("SUPABASE_ANON_KEY").ok(),
            },
            weather: WeatherConfig::default(),
            venue: VenueConfig::default(),
            strategy: StrategyConfig::default(),
            retry: RetrySettings::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the user config dir, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, creating default if it doesn't exist
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_url(&self.supabase.url, "supabase.url", &mut result);
        Self::validate_url(&self.weather.forecast_url, "weather.forecast_url", &mut result);
        Self::validate_url(&self.weather.marine_url, "weather.marine_url", &mut result);

        if self.supabase.resolved_anon_key().is_none() {
            result.add_warning(
                "supabase.anon_key",
                "No anon key configured - remote lookups will be rejected",
            );
        }

        if self.weather.timeout_secs == 0 {
            result.add_error("weather.timeout_secs", "Timeout must be greater than 0");
        }

        if self.weather.max_lead_hours == 0 {
            result.add_warning(
                "weather.max_lead_hours",
                "Forecast window is empty - weather will never be fetched",
            );
        }

        if self.weather.stale_after_hours == 0 {
            result.add_warning(
                "weather.stale_after_hours",
                "Every forecast will be reported as stale",
            );
        }

        let radius = self.venue.search_radius_km;
        if radius.is_nan() || radius <= 0.0 {
            result.add_error(
                "venue.search_radius_km",
                "Search radius must be greater than 0",
            );
        } else if radius > 500.0 {
            result.add_warning(
                "venue.search_radius_km",
                "Search radius is unusually large (>500 km)",
            );
        }

        if self.strategy.recent_limit == 0 {
            result.add_warning(
                "strategy.recent_limit",
                "History view will always be empty",
            );
        }

        if self.retry.max_attempts == 0 {
            result.add_error("retry.max_attempts", "At least one attempt is required");
        }

        if self.retry.backoff_multiplier < 1.0 {
            result.add_error(
                "retry.backoff_multiplier",
                "Backoff multiplier must be at least 1.0",
            );
        }

        if self.agent.extraction_function.trim().is_empty() {
            result.add_error("agent.extraction_function", "Function name is required");
        }

        result
    }

    fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the user config dir
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("regatta");

        Ok(config_dir.join("config.toml"))
    }
}
