//! Google Generative Language (Gemini) adapter.

use super::{GenerationHint, GenerativeService};
use crate::errors::ServiceError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Default model used when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// A [`GenerativeService`] backed by the Gemini REST API.
///
/// Credentials are passed in by the caller; the adapter never reads the
/// environment.
pub struct GeminiService {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiService {
    /// Creates a new adapter for `model`.
    ///
    /// # Errors
    ///
    /// Returns a fatal error if the key is blank or the HTTP client cannot
    /// be built.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ServiceError> {
        Self::with_timeout(api_key, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new adapter with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns a fatal error if the key is blank or the HTTP client cannot
    /// be built.
    pub fn with_timeout(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ServiceError::fatal("Gemini API key is empty"));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::fatal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        })
    }

    /// Overrides the API base URL (proxies, test servers).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(prompt: &str, hint: &GenerationHint) -> serde_json::Value {
        let mut body = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
        });
        if hint.wants_json() {
            body["generationConfig"] = json!({"responseMimeType": "application/json"});
        }
        body
    }

    fn map_transport_error(&self, err: &reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            ServiceError::transient(err.to_string())
        }
    }
}

impl std::fmt::Debug for GeminiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiService")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn classify_status(status: StatusCode, body: &str) -> ServiceError {
    let message = format!("Gemini API error {status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ServiceError::transient(message)
    } else if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::NOT_FOUND
    {
        ServiceError::fatal(message)
    } else {
        ServiceError::rejected(message)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn extract_text(response: GenerateResponse) -> Result<String, ServiceError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ServiceError::rejected(format!("prompt blocked: {reason}")));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::rejected("no candidates returned"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "empty".to_string());
        return Err(ServiceError::rejected(format!("empty candidate ({reason})")));
    }
    Ok(text)
}

#[async_trait]
impl GenerativeService for GeminiService {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str, hint: &GenerationHint) -> Result<String, ServiceError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        tracing::debug!(model = %self.model, prompt_len = prompt.len(), format = %hint.format, "Gemini request");

        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(prompt, hint))
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let response: GenerateResponse = res
            .json()
            .await
            .map_err(|e| self.map_transport_error(&e))?;
        extract_text(response)
    }
}
