pub mod config;
pub mod error;

pub use config::{
    AgentConfig, Config, RetrySettings, StrategyConfig, SupabaseConfig, ValidationResult,
    VenueConfig, WeatherConfig,
};
pub use error::{
    AppError, BackendError, ConfigError, NetworkError, ReqwestErrorExt, ValidationError,
    VenueError, WeatherError,
};

use anyhow::Result;

/// Initialize logging for the process.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Regatta core initialized");
    Ok(())
}
