use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;

use regatta_core::Config;
use regatta_services::{PlanAutosaver, RaceStore, StrategyStore, SupabaseClient};
use regatta_venue::{VenueResolution, VenueResolver, VenueSession};
use regatta_weather::{RaceWeatherService, WeatherMetadata, WeatherProvider};

const UPCOMING_RACE_LIMIT: usize = 5;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    regatta_core::init()?;

    let (config, _validation) = Config::load_validated()?;

    let client = SupabaseClient::from_config(&config).context("Failed to create backend client")?;
    let resolver = VenueResolver::from_config(client.clone(), &config.venue);
    let races = RaceStore::new(client.clone());
    let strategies =
        Arc::new(StrategyStore::new(client.clone()).with_recent_limit(config.strategy.recent_limit));
    let weather = RaceWeatherService::from_config(
        WeatherProvider::from_config(&config.weather).context("Failed to create weather provider")?,
        &config.weather,
    );
    let session = VenueSession::new();
    let autosaver = PlanAutosaver::spawn(
        strategies,
        Duration::from_millis(config.strategy.autosave_idle_ms),
    );

    tracing::info!("Regatta started");

    println!("Regatta - Race planning with venue, weather and strategy");
    println!("\nConfiguration:");
    println!("  Config directory: {}", config.config_dir.display());
    println!("  Backend: {}", config.supabase.url);

    if config.supabase.resolved_anon_key().is_none() {
        println!("\nNo backend key configured; set SUPABASE_ANON_KEY to load races.");
        autosaver.shutdown().await;
        return Ok(());
    }

    let upcoming = match races.upcoming_races(Utc::now(), UPCOMING_RACE_LIMIT).await {
        Ok(upcoming) => upcoming,
        Err(e) => {
            tracing::error!("Failed to load races: {}", e);
            println!("\n{}", e.user_message());
            Vec::new()
        }
    };

    println!("\nUpcoming races: {}", upcoming.len());
    for race in &upcoming {
        println!("  {} ({}) {}", race.name, race.status(Utc::now()).label(), race.start_date);

        if let Some((lat, lng)) = race.coordinates() {
            match resolver.resolve_by_coordinates(lat, lng).await {
                Ok(VenueResolution::Found(found)) => {
                    println!(
                        "    Venue: {} ({:.0}% match)",
                        found.venue.name,
                        found.confidence * 100.0
                    );
                    if session.current().is_none() {
                        session.select_match(found);
                    }
                }
                Ok(VenueResolution::NotFound { message }) => println!("    {}", message),
                Err(e) => tracing::warn!("Venue lookup failed for {}: {}", race.id, e),
            }
        }

        let stored = race
            .weather
            .clone()
            .and_then(|value| serde_json::from_value::<WeatherMetadata>(value).ok());
        if let Some(metadata) = stored.filter(|m| !weather.is_stale(m, Utc::now())) {
            println!(
                "    Wind: {} {}-{} kn (stored)",
                metadata.wind.direction, metadata.wind.speed_min, metadata.wind.speed_max
            );
            continue;
        }

        match weather.fetch_race_weather(race, None).await {
            Some(metadata) => {
                println!(
                    "    Wind: {} {}-{} kn",
                    metadata.wind.direction, metadata.wind.speed_min, metadata.wind.speed_max
                );
                if let Err(e) = races.save_weather(&race.id, &metadata).await {
                    tracing::warn!("Could not store weather for {}: {}", race.id, e);
                }
            }
            None => println!("    No forecast available yet"),
        }
    }

    // Graceful shutdown
    session.clear();
    autosaver.shutdown().await;

    Ok(())
}
