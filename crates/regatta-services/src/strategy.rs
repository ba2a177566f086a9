//! Strategy planner: per-phase plans, AI suggestions, and history rollups.
//!
//! Plans are keyed by `(domain, entity, phase)`. The history view is
//! recomputed from the stored entries on every fetch and never persisted.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::supabase::{eq, SupabaseClient, SupabaseError};

const STRATEGY_TABLE: &str = "strategy_entries";
const STRATEGY_CONFLICT_KEY: &str = "domain,entity_id,phase";

pub const DEFAULT_RECENT_LIMIT: usize = 3;

/// Product area a plan belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Sailing,
    Nursing,
    Drawing,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Sailing => "sailing",
            Domain::Nursing => "nursing",
            Domain::Drawing => "drawing",
        }
    }
}

/// Identifies one plan
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrategyKey {
    pub domain: Domain,
    pub entity_id: String,
    pub phase: String,
}

impl StrategyKey {
    pub fn new(domain: Domain, entity_id: impl Into<String>, phase: impl Into<String>) -> Self {
        Self {
            domain,
            entity_id: entity_id.into(),
            phase: phase.into(),
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// What/why/how/who of a plan for one phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyPlanFields {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub what: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub why: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub how: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub who: String,
}

impl StrategyPlanFields {
    pub fn is_empty(&self) -> bool {
        [&self.what, &self.why, &self.how, &self.who]
            .iter()
            .all(|f| f.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::Low => "low",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::High => "high",
        }
    }
}

/// AI-generated advice paired with a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAiSuggestion {
    pub summary: String,
    #[serde(default)]
    pub bullets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_points: Option<Vec<String>>,
}

/// One stored plan row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyEntry {
    pub id: Uuid,
    pub domain: Domain,
    pub entity_id: String,
    pub phase: String,
    #[serde(flatten)]
    pub plan: StrategyPlanFields,
    #[serde(default)]
    pub ai_suggestion: Option<StrategyAiSuggestion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StrategyEntry {
    pub fn key(&self) -> StrategyKey {
        StrategyKey::new(self.domain, self.entity_id.clone(), self.phase.clone())
    }

    pub fn confidence(&self) -> Option<ConfidenceTier> {
        self.ai_suggestion.as_ref().and_then(|s| s.confidence)
    }
}

/// Read-only rollup of the entries for one phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyPhaseHistory {
    pub phase: String,
    pub total_entries: usize,
    /// Most recently updated first
    pub recent: Vec<StrategyEntry>,
    pub last_confidence: Option<ConfidenceTier>,
}

/// Group `entries` by phase and keep the `recent_limit` most recently updated per phase.
///
/// Input order does not matter; entries with equal `updated_at` keep their input order.
pub fn aggregate_history(
    entries: &[StrategyEntry],
    recent_limit: usize,
) -> BTreeMap<String, StrategyPhaseHistory> {
    let mut by_phase: BTreeMap<&str, Vec<&StrategyEntry>> = BTreeMap::new();
    for entry in entries {
        by_phase.entry(entry.phase.as_str()).or_default().push(entry);
    }

    by_phase
        .into_iter()
        .map(|(phase, mut group)| {
            group.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            let history = StrategyPhaseHistory {
                phase: phase.to_string(),
                total_entries: group.len(),
                last_confidence: group.iter().find_map(|e| e.confidence()),
                recent: group.into_iter().take(recent_limit).cloned().collect(),
            };
            (phase.to_string(), history)
        })
        .collect()
}

/// History for a single phase; empty when no entry matches
pub fn phase_history(
    entries: &[StrategyEntry],
    phase: &str,
    recent_limit: usize,
) -> StrategyPhaseHistory {
    let matching: Vec<StrategyEntry> = entries
        .iter()
        .filter(|e| e.phase == phase)
        .cloned()
        .collect();

    aggregate_history(&matching, recent_limit)
        .remove(phase)
        .unwrap_or_else(|| StrategyPhaseHistory {
            phase: phase.to_string(),
            total_entries: 0,
            recent: Vec::new(),
            last_confidence: None,
        })
}

/// Render histories as compact prompt context for the AI agent
pub fn render_prompt_context(histories: &BTreeMap<String, StrategyPhaseHistory>) -> String {
    let mut out = String::new();

    for history in histories.values() {
        let _ = write!(out, "Phase {} ({} entries", history.phase, history.total_entries);
        if let Some(tier) = history.last_confidence {
            let _ = write!(out, ", last confidence {}", tier.as_str());
        }
        out.push_str(")\n");

        for entry in &history.recent {
            let fields = [
                ("What", &entry.plan.what),
                ("Why", &entry.plan.why),
                ("How", &entry.plan.how),
                ("Who", &entry.plan.who),
            ];
            let parts: Vec<String> = fields
                .iter()
                .filter(|(_, v)| !v.trim().is_empty())
                .map(|(label, v)| format!("{}: {}", label, v.trim()))
                .collect();
            if !parts.is_empty() {
                let _ = writeln!(out, "- {}", parts.join("; "));
            }
            if let Some(suggestion) = &entry.ai_suggestion {
                let _ = writeln!(out, "  AI: {}", suggestion.summary.trim());
            }
        }
    }

    out
}

#[derive(Serialize)]
struct PlanUpsert<'a> {
    domain: Domain,
    entity_id: &'a str,
    phase: &'a str,
    #[serde(flatten)]
    plan: &'a StrategyPlanFields,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct SuggestionUpsert<'a> {
    domain: Domain,
    entity_id: &'a str,
    phase: &'a str,
    ai_suggestion: &'a StrategyAiSuggestion,
    updated_at: DateTime<Utc>,
}

/// Strategy entries stored in the backend
#[derive(Debug, Clone)]
pub struct StrategyStore {
    client: SupabaseClient,
    recent_limit: usize,
}

impl StrategyStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self {
            client,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }

    pub fn with_recent_limit(mut self, recent_limit: usize) -> Self {
        self.recent_limit = recent_limit;
        self
    }

    /// Entries for a domain, optionally narrowed to one entity, newest first
    pub async fn list_entries(
        &self,
        domain: Domain,
        entity_id: Option<&str>,
    ) -> Result<Vec<StrategyEntry>, SupabaseError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("domain", eq(domain.as_str())),
            ("order", "updated_at.desc".to_string()),
        ];
        if let Some(entity_id) = entity_id {
            query.push(("entity_id", eq(entity_id)));
        }

        self.client.select(STRATEGY_TABLE, &query).await
    }

    /// Write the plan fields for a key, creating the entry if needed
    pub async fn save_plan(
        &self,
        key: &StrategyKey,
        plan: &StrategyPlanFields,
    ) -> Result<StrategyEntry, SupabaseError> {
        let row = PlanUpsert {
            domain: key.domain,
            entity_id: &key.entity_id,
            phase: &key.phase,
            plan,
            updated_at: Utc::now(),
        };
        let rows: Vec<StrategyEntry> = self
            .client
            .upsert(STRATEGY_TABLE, &[row], STRATEGY_CONFLICT_KEY)
            .await?;
        first_row(rows, key)
    }

    /// Overwrite the AI suggestion for a key without touching the plan fields
    pub async fn save_ai_suggestion(
        &self,
        key: &StrategyKey,
        suggestion: &StrategyAiSuggestion,
    ) -> Result<StrategyEntry, SupabaseError> {
        let row = SuggestionUpsert {
            domain: key.domain,
            entity_id: &key.entity_id,
            phase: &key.phase,
            ai_suggestion: suggestion,
            updated_at: Utc::now(),
        };
        let rows: Vec<StrategyEntry> = self
            .client
            .upsert(STRATEGY_TABLE, &[row], STRATEGY_CONFLICT_KEY)
            .await?;
        first_row(rows, key)
    }

    /// Per-phase history for a domain, optionally narrowed to one entity
    pub async fn fetch_history(
        &self,
        domain: Domain,
        entity_id: Option<&str>,
    ) -> Result<BTreeMap<String, StrategyPhaseHistory>, SupabaseError> {
        let entries = self.list_entries(domain, entity_id).await?;
        Ok(aggregate_history(&entries, self.recent_limit))
    }
}

fn first_row(rows: Vec<StrategyEntry>, key: &StrategyKey) -> Result<StrategyEntry, SupabaseError> {
    rows.into_iter().next().ok_or_else(|| {
        SupabaseError::Parse(format!(
            "upsert for {}/{}/{} returned no rows",
            key.domain.as_str(),
            key.entity_id,
            key.phase
        ))
    })
}
