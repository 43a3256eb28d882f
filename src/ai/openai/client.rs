use super::types::{ApiErrorEnvelope, ChatCompletionRequest, ChatCompletionResponse};
use crate::ai::CompletionService;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::error::Error as _;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
const MAX_ERROR_CHARS: usize = 300;

/// Chat-completion client for OpenAI-compatible providers.
pub struct OpenAiCompletionClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiCompletionClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::new_with_client(api_key, client))
    }

    pub fn new_with_client(api_key: String, client: Client) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Transport failure text including the reqwest source chain, which its
    /// `Display` omits.
    fn describe_transport_error(&self, e: &reqwest::Error) -> String {
        let mut message = if e.is_timeout() {
            "Upstream request timeout: ".to_string()
        } else if e.is_connect() {
            "Upstream connection failed: ".to_string()
        } else {
            String::new()
        };
        message.push_str(&e.to_string());

        let mut source = e.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        self.sanitize(&message)
    }

    /// Bound provider text and strip the credential before it can reach a caller.
    fn sanitize(&self, text: &str) -> String {
        let redacted = if self.api_key.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.api_key, "[redacted]")
        };
        let trimmed = redacted.trim();
        if trimmed.chars().count() > MAX_ERROR_CHARS {
            let mut short: String = trimmed.chars().take(MAX_ERROR_CHARS).collect();
            short.push_str("...");
            short
        } else {
            trimmed.to_string()
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionClient {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let url = format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH);
        tracing::debug!(
            "Sending chat completion request ({} messages) to {}",
            request.messages.len(),
            url
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                let message = self.describe_transport_error(&e);
                tracing::error!("Failed to send request to completion provider: {}", message);
                Error::Upstream(message)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            let message = self.describe_transport_error(&e);
            tracing::error!("Failed to read completion provider response: {}", message);
            Error::Upstream(message)
        })?;

        if !status.is_success() {
            tracing::error!("Completion provider error (status {}): {}", status, body);
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            return Err(Error::Upstream(self.sanitize(&format!(
                "{} {}",
                status.as_u16(),
                message
            ))));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse completion response: {}\nBody: {}", e, body);
            Error::Upstream(format!("Failed to parse completion response: {}", e))
        })
    }
}
