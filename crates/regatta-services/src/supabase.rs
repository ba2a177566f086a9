//! Thin PostgREST client for the hosted Supabase backend.
//!
//! Only table reads/writes and RPC calls are covered; the schema itself is
//! owned by the backend. Every call goes through [`with_retry_if`].

use std::sync::Arc;
use std::time::Duration;

use regatta_core::{AppError, BackendError, NetworkError, ReqwestErrorExt};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::retry::{is_retryable_error, is_retryable_status, with_retry_if, RetryConfig, RetryDecision};

const REQUEST_TIMEOUT_SECS: u64 = 30;
/// PostgREST code for "function not found in schema cache"
const MISSING_FUNCTION_CODE: &str = "PGRST202";

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote function not found: {0}")]
    FunctionNotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SupabaseError {
    pub fn retry_decision(&self) -> RetryDecision {
        match self {
            Self::Network(e) => is_retryable_error(e),
            Self::Api { status, .. } => StatusCode::from_u16(*status)
                .map(is_retryable_status)
                .unwrap_or(RetryDecision::NoRetry),
            _ => RetryDecision::NoRetry,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(_) => "Unable to connect. Check your internet connection.",
            Self::Unauthorized => "Your session has expired. Please sign in again.",
            Self::NotFound(_) => "The requested record could not be found.",
            Self::FunctionNotFound(_) => {
                "This feature is temporarily unavailable. Please try again later."
            }
            Self::Api { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            Self::Api { .. } | Self::InvalidRequest(_) => {
                "The request was rejected. Please check your input."
            }
            Self::Parse(_) => "Received an unexpected response. Please try again.",
        }
    }
}

impl From<SupabaseError> for AppError {
    fn from(e: SupabaseError) -> Self {
        match e {
            SupabaseError::Network(e) => AppError::Network(e.into_network_error()),
            SupabaseError::Unauthorized => AppError::Backend(BackendError::Unauthorized),
            SupabaseError::NotFound(s) => AppError::Backend(BackendError::NotFound(s)),
            SupabaseError::FunctionNotFound(s) => {
                AppError::Backend(BackendError::FunctionUnavailable(s))
            }
            SupabaseError::Api { status: 408, .. } => AppError::Network(NetworkError::Timeout),
            SupabaseError::Api { status, message } if status >= 500 => {
                AppError::Backend(BackendError::ServerError { status, message })
            }
            SupabaseError::Api { status, message } => {
                AppError::Backend(BackendError::Rejected { status, message })
            }
            SupabaseError::Parse(s) => AppError::Network(NetworkError::InvalidResponse(s)),
            SupabaseError::InvalidRequest(message) => {
                AppError::Backend(BackendError::Rejected { status: 0, message })
            }
        }
    }
}

/// What a request targets; decides how a 404 is reported.
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Table(&'a str),
    Function(&'a str),
}

/// PostgREST client
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    base_url: Url,
    client: Arc<Client>,
    api_key: String,
    access_token: Option<String>,
    retry: RetryConfig,
}

impl SupabaseClient {
    /// Create a client for the project at `base_url` using the public anon key
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, SupabaseError> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized)
            .map_err(|e| SupabaseError::InvalidRequest(format!("invalid base url: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            base_url,
            client: Arc::new(client),
            api_key: api_key.to_string(),
            access_token: None,
            retry: RetryConfig::default(),
        })
    }

    /// Build a client from application config
    pub fn from_config(config: &regatta_core::Config) -> Result<Self, SupabaseError> {
        let api_key = config.supabase.resolved_anon_key().unwrap_or_else(|| {
            tracing::warn!("No Supabase anon key configured");
            String::new()
        });
        Ok(Self::new(&config.supabase.url, &api_key)?.with_retry(RetryConfig::from(&config.retry)))
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Act on behalf of a signed-in user instead of the anon role
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Drop the user token (sign-out)
    pub fn clear_access_token(&mut self) {
        self.access_token = None;
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    fn endpoint(&self, path: &str) -> Result<Url, SupabaseError> {
        self.base_url
            .join(path)
            .map_err(|e| SupabaseError::InvalidRequest(format!("invalid path {path}: {e}")))
    }

    fn build_request(&self, req: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        req.header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
            .header(header::ACCEPT, "application/json")
    }

    async fn handle_response<T: DeserializeOwned>(
        response: Response,
        target: Target<'_>,
    ) -> Result<T, SupabaseError> {
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            // PATCH/upsert without representation answer with an empty body
            let body = if bytes.is_empty() { &b"null"[..] } else { &bytes[..] };
            return serde_json::from_slice(body)
                .map_err(|e| SupabaseError::Parse(format!("JSON parse error: {}", e)));
        }

        let text = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SupabaseError::Unauthorized),
            StatusCode::NOT_FOUND => match target {
                Target::Function(name) => Err(SupabaseError::FunctionNotFound(name.to_string())),
                Target::Table(name) => Err(SupabaseError::NotFound(name.to_string())),
            },
            _ if text.contains(MISSING_FUNCTION_CODE) => match target {
                Target::Function(name) => Err(SupabaseError::FunctionNotFound(name.to_string())),
                Target::Table(_) => Err(SupabaseError::Api {
                    status: status.as_u16(),
                    message: text,
                }),
            },
            _ => Err(SupabaseError::Api {
                status: status.as_u16(),
                message: text,
            }),
        }
    }

    /// Call a Postgres function exposed over RPC
    #[instrument(skip(self, params), level = "debug")]
    pub async fn rpc<P, T>(&self, function: &str, params: &P) -> Result<T, SupabaseError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(&format!("rest/v1/rpc/{}", function))?;
        let url = &url;

        with_retry_if(&self.retry, SupabaseError::retry_decision, move || async move {
            let response = self
                .build_request(self.client.post(url.clone()))
                .json(params)
                .send()
                .await?;
            Self::handle_response(response, Target::Function(function)).await
        })
        .await
    }

    /// Read rows using PostgREST query parameters (`select`, filters, `order`, `limit`)
    #[instrument(skip(self), level = "debug")]
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, SupabaseError> {
        let url = self.endpoint(&format!("rest/v1/{}", table))?;
        let url = &url;

        let rows: Vec<T> = with_retry_if(&self.retry, SupabaseError::retry_decision, move || async move {
            let response = self
                .build_request(self.client.get(url.clone()).query(query))
                .send()
                .await?;
            Self::handle_response(response, Target::Table(table)).await
        })
        .await?;

        tracing::debug!("Fetched {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    /// Insert or merge rows, returning the stored representation
    #[instrument(skip(self, rows), level = "debug")]
    pub async fn upsert<B, T>(
        &self,
        table: &str,
        rows: &B,
        on_conflict: &str,
    ) -> Result<Vec<T>, SupabaseError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(&format!("rest/v1/{}", table))?;
        let url = &url;

        with_retry_if(&self.retry, SupabaseError::retry_decision, move || async move {
            let response = self
                .build_request(self.client.post(url.clone()))
                .query(&[("on_conflict", on_conflict)])
                .header("Prefer", "resolution=merge-duplicates,return=representation")
                .json(rows)
                .send()
                .await?;
            Self::handle_response(response, Target::Table(table)).await
        })
        .await
    }

    /// Patch the rows matching `filters`, returning the updated representation
    #[instrument(skip(self, patch), level = "debug")]
    pub async fn update<B, T>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        patch: &B,
    ) -> Result<Vec<T>, SupabaseError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        if filters.is_empty() {
            return Err(SupabaseError::InvalidRequest(format!(
                "refusing unfiltered update of {table}"
            )));
        }

        let url = self.endpoint(&format!("rest/v1/{}", table))?;
        let url = &url;

        with_retry_if(&self.retry, SupabaseError::retry_decision, move || async move {
            let response = self
                .build_request(self.client.patch(url.clone()).query(filters))
                .header("Prefer", "return=representation")
                .json(patch)
                .send()
                .await?;
            Self::handle_response(response, Target::Table(table)).await
        })
        .await
    }

    /// Base URL of the project, for sibling APIs such as edge functions
    pub(crate) fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        self.build_request(req)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }
}

/// PostgREST equality filter value
pub fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = SupabaseClient::new("https://demo.supabase.co/", "key").unwrap();
        let url = client.endpoint("rest/v1/venues").unwrap();
        assert_eq!(url.as_str(), "https://demo.supabase.co/rest/v1/venues");

        let client = SupabaseClient::new("http://127.0.0.1:54321", "key").unwrap();
        let url = client.endpoint("rest/v1/rpc/nearby").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:54321/rest/v1/rpc/nearby");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = SupabaseClient::new("not a url", "key").unwrap_err();
        assert!(matches!(err, SupabaseError::InvalidRequest(_)));
    }

    #[test]
    fn test_retry_decision() {
        let server = SupabaseError::Api {
            status: 503,
            message: "unavailable".into(),
        };
        let client = SupabaseError::Api {
            status: 400,
            message: "bad".into(),
        };
        assert_eq!(server.retry_decision(), RetryDecision::Retry);
        assert_eq!(client.retry_decision(), RetryDecision::NoRetry);
        assert_eq!(SupabaseError::Unauthorized.retry_decision(), RetryDecision::NoRetry);
        assert_eq!(
            SupabaseError::FunctionNotFound("f".into()).retry_decision(),
            RetryDecision::NoRetry
        );
    }

    #[test]
    fn test_app_error_mapping() {
        let app: AppError = SupabaseError::FunctionNotFound("venues_within_radius".into()).into();
        assert!(matches!(app, AppError::Backend(BackendError::FunctionUnavailable(_))));

        let app: AppError = SupabaseError::Api {
            status: 502,
            message: "gateway".into(),
        }
        .into();
        assert!(app.is_transient());
    }

    #[test]
    fn test_user_message() {
        assert!(SupabaseError::Unauthorized.user_message().contains("sign in"));
    }

    #[test]
    fn test_eq_filter() {
        assert_eq!(eq("abc"), "eq.abc");
        assert_eq!(eq(42), "eq.42");
    }
}
