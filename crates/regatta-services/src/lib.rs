pub mod agent;
pub mod autosave;
pub mod race;
pub mod retry;
pub mod strategy;
pub mod supabase;

pub use agent::{AgentClient, AgentOutcome, RaceExtraction};
pub use autosave::{PlanAutosaver, PlanSink};
pub use race::{Race, RaceStatus, RaceStore};
pub use retry::{with_retry, with_retry_if, RetryConfig, RetryDecision};
pub use strategy::{
    aggregate_history, phase_history, render_prompt_context, ConfidenceTier, Domain,
    StrategyAiSuggestion, StrategyEntry, StrategyKey, StrategyPhaseHistory, StrategyPlanFields,
    StrategyStore,
};
pub use supabase::{SupabaseClient, SupabaseError};
