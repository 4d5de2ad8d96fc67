//! Stakeholder reply generation.
//!
//! - [`CompletionClient`] abstracts a chat-completion backend.
//! - [`openai::OpenAiCompletionClient`] talks to any OpenAI-compatible
//!   `/v1/chat/completions` endpoint.
//! - [`prompt`] renders the persona prompt and trimmed history.
//! - [`ResponseGenerator`] picks the speaker and produces the reply message.

pub mod generator;
pub mod openai;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::LlmConfig;
use crate::error::Result;

pub use generator::ResponseGenerator;
pub use openai::OpenAiCompletionClient;

/// Author role of a chat turn, as the completion API sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions.
    System,
    /// The learner.
    User,
    /// The stakeholder being voiced.
    Assistant,
}

/// One role-tagged turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Author role.
    pub role: Role,
    /// Text.
    pub content: String,
}

impl ChatTurn {
    /// A learner turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// A stakeholder turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum completion tokens.
    pub max_tokens: u32,
    /// Penalty for tokens already present.
    pub presence_penalty: f64,
    /// Penalty proportional to token frequency.
    pub frequency_penalty: f64,
}

impl From<&LlmConfig> for Sampling {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            presence_penalty: config.presence_penalty,
            frequency_penalty: config.frequency_penalty,
        }
    }
}

impl Default for Sampling {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

/// Everything a completion backend needs for one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Persona and behaviour instructions.
    pub system_prompt: String,
    /// Trimmed history followed by the new learner turn.
    pub turns: Vec<ChatTurn>,
    /// Sampling parameters.
    pub sampling: Sampling,
}

/// A chat-completion backend.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Produce the completion text for `request`.
    ///
    /// Implementations must honour `cancel` and return
    /// [`crate::error::MeetingError::Cancelled`] without dispatching when it
    /// is already cancelled.
    async fn complete(&self, request: &CompletionRequest, cancel: &CancellationToken)
    -> Result<String>;
}
