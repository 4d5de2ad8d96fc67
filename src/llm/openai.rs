//! OpenAI-compatible chat-completion client.
//!
//! Sends a single non-streaming request to `{base_url}/v1/chat/completions`
//! and returns the first choice's message content.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{CompletionClient, CompletionRequest};
use crate::config::LlmConfig;
use crate::error::{MeetingError, Result, with_cancellation};

const SERVICE: &str = "completion";

/// Chat-completion client for OpenAI and compatible servers.
pub struct OpenAiCompletionClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompletionClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl OpenAiCompletionClient {
    /// Client for the public OpenAI API with no explicit timeout.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_owned(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Point at another OpenAI-compatible server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MeetingError::Config`] when no API key is configured or the
    /// HTTP client cannot be built.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| MeetingError::Config("completion API key is not configured".into()))?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| MeetingError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.to_owned(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            client,
        })
    }

    /// JSON body for `request`.
    pub fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        messages.push(serde_json::json!({
            "role": "system",
            "content": request.system_prompt,
        }));
        messages.extend(request.turns.iter().map(|t| {
            serde_json::json!({
                "role": t.role,
                "content": t.content,
            })
        }));
        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.sampling.temperature,
            "max_tokens": request.sampling.max_tokens,
            "presence_penalty": request.sampling.presence_penalty,
            "frequency_penalty": request.sampling.frequency_penalty,
            "stream": false,
        })
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(request);
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MeetingError::from_status(
                SERVICE,
                status.as_u16(),
                &extract_error_message(&text),
            ));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MeetingError::Transport(format!("invalid completion response: {e}")))?;
        let content = json
            .pointer("/choices/0/message/content")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if content.is_empty() {
            return Err(MeetingError::EmptyCompletion(
                "completion response contained no text".into(),
            ));
        }

        info!(
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = content.len(),
            "completion received"
        );
        Ok(content.to_owned())
    }
}

/// Map a reqwest failure (no response received) to a transport error.
pub(crate) fn map_transport_error(err: reqwest::Error) -> MeetingError {
    if err.is_timeout() {
        MeetingError::Transport(format!("request timed out: {err}"))
    } else {
        MeetingError::Transport(format!("request failed: {err}"))
    }
}

/// Pull `error.message` out of an OpenAI-style error body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(serde_json::Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_owned())
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String> {
        debug!(
            turns = request.turns.len(),
            prompt_chars = request.system_prompt.len(),
            "sending completion request"
        );
        with_cancellation(cancel, "completion request", self.send(request)).await
    }
}
