//! OpenAI-compatible chat completions provider (non-streaming)

use crate::error::{extract_retry_after, parse_retry_after_header, ProviderError};
use crate::{r#trait::Provider, Message, RequestSpec};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use wayfarer_foundation::ProviderSettings;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// OpenAI provider
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: Self::build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
            api_key: api_key.into(),
            base_url: DEFAULT_API_URL.to_string(),
        })
    }

    /// Build from settings; the API key must be present
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::NotConfigured("OpenAI API key is not set".to_string())
            })?;

        let mut provider = Self::new(api_key)?.with_timeout(settings.timeout())?;
        if let Some(base_url) = &settings.base_url {
            provider = provider.with_base_url(base_url);
        }
        Ok(provider)
    }

    /// Create with custom base URL (for OpenAI-compatible APIs)
    ///
    /// `https://host/v1` and `https://host/v1/chat/completions` are both accepted.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        let trimmed = base_url.as_ref().trim_end_matches('/');
        self.base_url = if trimmed.ends_with("/chat/completions") {
            trimmed.to_string()
        } else {
            format!("{}/chat/completions", trimmed)
        };
        self
    }

    /// Set custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ProviderError> {
        self.client = Self::build_client(timeout)?;
        Ok(self)
    }

    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    fn build_client(timeout: Duration) -> Result<Client, ProviderError> {
        Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))
    }

    fn build_request(request: &RequestSpec) -> OpenAiRequest<'_> {
        OpenAiRequest {
            model: &request.model,
            messages: request.messages.iter().map(OpenAiMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        }
    }

    /// Parse error response from OpenAI API
    ///
    /// `retry_after_ms` comes from the `Retry-After` header and wins over any
    /// delay found in the body.
    fn parse_error_response(
        status: reqwest::StatusCode,
        retry_after_ms: Option<u64>,
        body: &str,
    ) -> ProviderError {
        match Self::error_from_body(status, body) {
            ProviderError::RateLimited {
                retry_after_ms: from_body,
            } => ProviderError::RateLimited {
                retry_after_ms: retry_after_ms.or(from_body),
            },
            other => other,
        }
    }

    fn error_from_body(status: reqwest::StatusCode, body: &str) -> ProviderError {
        if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            let error = error_response.error;
            let message = error.message;

            return match error.code.as_deref() {
                Some("rate_limit_exceeded") => ProviderError::RateLimited {
                    retry_after_ms: extract_retry_after(&message),
                },
                Some("context_length_exceeded") => ProviderError::ContextLengthExceeded(message),
                Some("invalid_api_key") => ProviderError::Authentication(message),
                Some("insufficient_quota") => ProviderError::QuotaExceeded(message),
                Some("model_not_found") => ProviderError::InvalidRequest(message),
                _ => ProviderError::from_http_status(status.as_u16(), &message),
            };
        }

        ProviderError::from_http_status(status.as_u16(), body)
    }

    fn extract_content(response: OpenAiResponse) -> Result<String, ProviderError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        choice
            .message
            .content
            .ok_or_else(|| ProviderError::InvalidResponse("Empty message content".to_string()))
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &RequestSpec) -> Result<String, ProviderError> {
        let body = Self::build_request(request);

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after_header);
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, retry_after_ms, &body));
        }

        let api_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if let Some(usage) = &api_response.usage {
            debug!(
                model = %request.model,
                input_tokens = usage.prompt_tokens,
                output_tokens = usage.completion_tokens,
                "Completion received"
            );
        }

        Self::extract_content(api_response)
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Message> for OpenAiMessage<'a> {
    fn from(msg: &'a Message) -> Self {
        Self {
            role: msg.role.as_str(),
            content: &msg.content,
        }
    }
}

// Response types
#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// Error types
#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
    code: Option<String>,
}
