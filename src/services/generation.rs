// src/services/generation.rs

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// How a failed generation call should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// Rate or volume limiting. Retried after a long cooldown.
    Quota,
    /// Network trouble or a server-side failure. Retried with backoff.
    Transient,
    Other,
}

#[derive(Debug, Clone)]
pub struct GenerationServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl GenerationServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classifies a failure from its HTTP status (if any) and message text.
    pub fn classify(status: Option<StatusCode>, message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_ascii_lowercase();

        let kind = if status == Some(StatusCode::TOO_MANY_REQUESTS)
            || lowered.contains("quota")
            || lowered.contains("resource_exhausted")
            || lowered.contains("rate limit")
        {
            ServiceErrorKind::Quota
        } else if status.is_some_and(|s| s.is_server_error() || s == StatusCode::REQUEST_TIMEOUT) {
            ServiceErrorKind::Transient
        } else {
            ServiceErrorKind::Other
        };

        Self { kind, message }
    }

    pub fn is_quota(&self) -> bool {
        self.kind == ServiceErrorKind::Quota
    }
}

impl fmt::Display for GenerationServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "generation service error ({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for GenerationServiceError {}

impl From<reqwest::Error> for GenerationServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            GenerationServiceError::new(ServiceErrorKind::Transient, err.to_string())
        } else {
            GenerationServiceError::classify(err.status(), err.to_string())
        }
    }
}

/// A text-generation backend: prompt in, raw response text out.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenerationServiceError>;
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: String,
}

/// Client for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta";

    pub fn new(api_key: String, model: String) -> Result<Self, GenerationServiceError> {
        Self::with_base_url(api_key, model, Self::DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
    ) -> Result<Self, GenerationServiceError> {
        if api_key.trim().is_empty() {
            return Err(GenerationServiceError::new(
                ServiceErrorKind::Other,
                "API key missing",
            ));
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenerationServiceError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(%status, "Gemini request failed: {}", error_text);
            return Err(GenerationServiceError::classify(
                Some(status),
                format!("{}: {}", status, error_text),
            ));
        }

        let parsed: GeminiResponse = response.json().await?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| GenerationServiceError::new(ServiceErrorKind::Other, "Empty response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_quota_signals() {
        let by_status = GenerationServiceError::classify(Some(StatusCode::TOO_MANY_REQUESTS), "slow down");
        assert_eq!(by_status.kind, ServiceErrorKind::Quota);

        let by_message = GenerationServiceError::classify(None, "You exceeded your current Quota");
        assert!(by_message.is_quota());

        let exhausted = GenerationServiceError::classify(Some(StatusCode::FORBIDDEN), "RESOURCE_EXHAUSTED");
        assert!(exhausted.is_quota());
    }

    #[test]
    fn classifies_server_errors_as_transient() {
        let err = GenerationServiceError::classify(Some(StatusCode::SERVICE_UNAVAILABLE), "overloaded");
        assert_eq!(err.kind, ServiceErrorKind::Transient);
        let err = GenerationServiceError::classify(Some(StatusCode::BAD_REQUEST), "bad prompt");
        assert_eq!(err.kind, ServiceErrorKind::Other);
    }

    #[test]
    fn client_requires_api_key() {
        assert!(GeminiClient::new("  ".to_string(), "gemini-2.5-flash".to_string()).is_err());
    }
}
