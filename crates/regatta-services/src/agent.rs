//! AI agent boundary.
//!
//! Agents run as backend edge functions: the caller sends free text plus a
//! JSON schema and gets back either structured data or a failure. Responses
//! are validated here so nothing untyped leaks past this module.

use chrono::NaiveDate;
use regatta_core::{AppError, ValidationError};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::retry::with_retry_if;
use crate::supabase::{SupabaseClient, SupabaseError};

/// Result of one agent call
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutcome<T> {
    Success { data: T },
    /// Required fields the agent could not extract
    MissingFields { names: Vec<String> },
    Failure { message: String },
}

impl<T> AgentOutcome<T> {
    pub fn into_result(self) -> Result<T, AppError> {
        match self {
            AgentOutcome::Success { data } => Ok(data),
            AgentOutcome::MissingFields { names } => {
                Err(ValidationError::MissingFields(names).into())
            }
            AgentOutcome::Failure { message } => Err(anyhow::anyhow!(message).into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AgentOutcome::Success { .. })
    }
}

#[derive(Debug, Deserialize)]
struct AgentEnvelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    missing_fields: Vec<String>,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Check `data` for every required field, then deserialize it.
pub fn validate_payload<T: DeserializeOwned>(data: Value, required: &[&str]) -> AgentOutcome<T> {
    let Some(object) = data.as_object() else {
        return AgentOutcome::Failure {
            message: "agent returned a non-object payload".to_string(),
        };
    };

    let missing: Vec<String> = required
        .iter()
        .filter(|field| object.get(**field).map_or(true, is_blank))
        .map(|field| field.to_string())
        .collect();

    if !missing.is_empty() {
        return AgentOutcome::MissingFields { names: missing };
    }

    match serde_json::from_value(data) {
        Ok(data) => AgentOutcome::Success { data },
        Err(e) => AgentOutcome::Failure {
            message: format!("agent payload did not match the schema: {e}"),
        },
    }
}

/// Interpret a full agent response body.
pub fn interpret_response<T: DeserializeOwned>(body: Value, required: &[&str]) -> AgentOutcome<T> {
    let envelope: AgentEnvelope = match serde_json::from_value(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            return AgentOutcome::Failure {
                message: format!("unreadable agent response: {e}"),
            }
        }
    };

    if envelope.success == Some(false) {
        if !envelope.missing_fields.is_empty() {
            return AgentOutcome::MissingFields {
                names: envelope.missing_fields,
            };
        }
        return AgentOutcome::Failure {
            message: envelope
                .error
                .unwrap_or_else(|| "agent reported a failure".to_string()),
        };
    }

    match envelope.data {
        Some(data) => validate_payload(data, required),
        None => AgentOutcome::Failure {
            message: "agent returned no data".to_string(),
        },
    }
}

/// Race details pulled out of a notice of race or free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceExtraction {
    pub name: String,
    pub start_date: NaiveDate,
    pub venue: String,
    #[serde(default)]
    pub warning_signal_time: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl RaceExtraction {
    pub const REQUIRED_FIELDS: [&'static str; 3] = ["name", "start_date", "venue"];

    pub fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "start_date": { "type": "string", "format": "date" },
                "venue": { "type": "string" },
                "warning_signal_time": { "type": "string", "pattern": "^\\d{2}:\\d{2}(:\\d{2})?$" },
                "timezone": { "type": "string" },
                "latitude": { "type": "number" },
                "longitude": { "type": "number" }
            },
            "required": Self::REQUIRED_FIELDS,
        })
    }
}

#[derive(Serialize)]
struct AgentRequest<'a> {
    input: &'a str,
    schema: &'a Value,
}

/// Client for agent edge functions
#[derive(Debug, Clone)]
pub struct AgentClient {
    client: SupabaseClient,
    extraction_function: String,
}

impl AgentClient {
    pub fn new(client: SupabaseClient, extraction_function: impl Into<String>) -> Self {
        Self {
            client,
            extraction_function: extraction_function.into(),
        }
    }

    pub fn from_config(client: SupabaseClient, config: &regatta_core::AgentConfig) -> Self {
        Self::new(client, config.extraction_function.trim())
    }

    /// Run `function` on `input`, validating the answer against `required`.
    #[instrument(skip(self, input, schema), level = "info")]
    pub async fn invoke<T: DeserializeOwned>(
        &self,
        function: &str,
        input: &str,
        schema: &Value,
        required: &[&str],
    ) -> Result<AgentOutcome<T>, SupabaseError> {
        let url = self
            .client
            .base_url()
            .join(&format!("functions/v1/{}", function))
            .map_err(|e| SupabaseError::InvalidRequest(format!("invalid function {function}: {e}")))?;
        let url = &url;
        let body = AgentRequest { input, schema };
        let body = &body;
        let client = &self.client;

        let response_body: Value = with_retry_if(
            self.client.retry_config(),
            SupabaseError::retry_decision,
            move || async move {
                let response = client
                    .authorized(client.http().post(url.clone()))
                    .json(body)
                    .send()
                    .await?;
                read_agent_response(response, function).await
            },
        )
        .await?;

        let outcome = interpret_response(response_body, required);
        match &outcome {
            AgentOutcome::Success { .. } => tracing::info!("Agent {} succeeded", function),
            AgentOutcome::MissingFields { names } => {
                tracing::info!("Agent {} missing fields: {}", function, names.join(", "))
            }
            AgentOutcome::Failure { message } => {
                tracing::warn!("Agent {} failed: {}", function, message)
            }
        }
        Ok(outcome)
    }

    /// Extract race details from free text
    pub async fn extract_race_details(
        &self,
        text: &str,
    ) -> Result<AgentOutcome<RaceExtraction>, SupabaseError> {
        self.invoke(
            &self.extraction_function,
            text,
            &RaceExtraction::schema(),
            &RaceExtraction::REQUIRED_FIELDS,
        )
        .await
    }
}

async fn read_agent_response(
    response: reqwest::Response,
    function: &str,
) -> Result<Value, SupabaseError> {
    let status = response.status();
    match status {
        s if s.is_success() => response
            .json()
            .await
            .map_err(|e| SupabaseError::Parse(format!("JSON parse error: {}", e))),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SupabaseError::Unauthorized),
        StatusCode::NOT_FOUND => Err(SupabaseError::FunctionNotFound(function.to_string())),
        // Validation failures come back as 4xx with the usual envelope
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            let text = response.text().await.unwrap_or_default();
            match serde_json::from_str::<Value>(&text) {
                Ok(body) if body.get("success").is_some() => Ok(body),
                _ => Err(SupabaseError::Api {
                    status: status.as_u16(),
                    message: text,
                }),
            }
        }
        _ => Err(SupabaseError::Api {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        }),
    }
}
