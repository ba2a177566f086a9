//! Race records and their derived status label.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::supabase::{eq, SupabaseClient, SupabaseError};

const RACES_TABLE: &str = "regattas";

/// How long after the scheduled start a race still counts as running
pub const DEFAULT_RACE_DURATION_HOURS: i64 = 6;

/// Race lifecycle label, derived purely from timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceStatus {
    Upcoming,
    Active,
    Completed,
}

impl RaceStatus {
    pub fn derive(start: DateTime<Utc>, now: DateTime<Utc>, duration: Duration) -> Self {
        if start > now {
            RaceStatus::Upcoming
        } else if now < start + duration {
            RaceStatus::Active
        } else {
            RaceStatus::Completed
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RaceStatus::Upcoming => "upcoming",
            RaceStatus::Active => "active",
            RaceStatus::Completed => "completed",
        }
    }
}

/// A race as stored by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Race {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub venue_id: Option<String>,
    /// Scheduled start as stored (the calendar date is read from it)
    pub start_date: DateTime<Utc>,
    /// Local clock time of the warning signal, `HH:MM` or `HH:MM:SS`
    #[serde(default)]
    pub warning_signal_time: Option<String>,
    /// IANA timezone of the venue, e.g. `Asia/Hong_Kong`
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub weather: Option<serde_json::Value>,
}

impl Race {
    pub fn status(&self, now: DateTime<Utc>) -> RaceStatus {
        RaceStatus::derive(
            self.start_date,
            now,
            Duration::hours(DEFAULT_RACE_DURATION_HOURS),
        )
    }

    /// Coordinates when both halves are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Race reads/writes against the backend
#[derive(Debug, Clone)]
pub struct RaceStore {
    client: SupabaseClient,
}

impl RaceStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub async fn get_race(&self, id: &str) -> Result<Option<Race>, SupabaseError> {
        let rows: Vec<Race> = self
            .client
            .select(
                RACES_TABLE,
                &[("select", "*".to_string()), ("id", eq(id)), ("limit", "1".to_string())],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Races starting at or after `now`, soonest first
    pub async fn upcoming_races(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Race>, SupabaseError> {
        self.client
            .select(
                RACES_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("start_date", format!("gte.{}", now.to_rfc3339())),
                    ("order", "start_date.asc".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await
    }

    /// Replace the weather snapshot stored on a race
    pub async fn save_weather<W: Serialize>(
        &self,
        race_id: &str,
        weather: &W,
    ) -> Result<(), SupabaseError> {
        let patch = serde_json::json!({ "weather": weather });
        let updated: Vec<Race> = self
            .client
            .update(RACES_TABLE, &[("id", eq(race_id))], &patch)
            .await?;

        if updated.is_empty() {
            return Err(SupabaseError::NotFound(format!("race {race_id}")));
        }
        tracing::info!("Saved weather for race {}", race_id);
        Ok(())
    }
}
