//! Reply generation: speaker selection, prompt assembly and the completion call.

use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::prompt::{TurnFlags, build_system_prompt, build_turns, has_spoken};
use super::{CompletionClient, CompletionRequest, OpenAiCompletionClient, Sampling};
use crate::config::LlmConfig;
use crate::error::{MeetingError, Result};
use crate::model::{Message, Project, Stakeholder};
use crate::selector::select_speaker_with_reason;
use crate::text::is_greeting;

/// Produces stakeholder replies through a [`CompletionClient`].
///
/// A generator without a client is valid to construct but every call to
/// [`ResponseGenerator::generate_response`] fails with a configuration
/// error; it never substitutes canned dialogue.
#[derive(Clone)]
pub struct ResponseGenerator {
    client: Option<Arc<dyn CompletionClient>>,
    sampling: Sampling,
    prompt_history_turns: usize,
    request_history_turns: usize,
}

impl std::fmt::Debug for ResponseGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseGenerator")
            .field("client", &self.client.as_ref().map(|c| c.name().to_owned()))
            .field("sampling", &self.sampling)
            .field("prompt_history_turns", &self.prompt_history_turns)
            .field("request_history_turns", &self.request_history_turns)
            .finish()
    }
}

impl ResponseGenerator {
    /// Generator over an explicit client (or none).
    pub fn new(client: Option<Arc<dyn CompletionClient>>, config: &LlmConfig) -> Self {
        Self {
            client,
            sampling: Sampling::from(config),
            prompt_history_turns: config.prompt_history_turns,
            request_history_turns: config.request_history_turns,
        }
    }

    /// Generator using the OpenAI client when credentials are configured.
    ///
    /// Missing credentials leave the generator unconfigured; the error
    /// surfaces on first use.
    ///
    /// # Errors
    ///
    /// Returns an error only if the HTTP client cannot be built.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client: Option<Arc<dyn CompletionClient>> = if config.is_configured() {
            Some(Arc::new(OpenAiCompletionClient::from_config(config)?))
        } else {
            warn!("completion API key missing; stakeholder replies are unavailable");
            None
        };
        Ok(Self::new(client, config))
    }

    /// Whether a completion client is present.
    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Pick the responding stakeholder and generate their reply.
    ///
    /// `history` holds the messages before `user_message`.
    ///
    /// # Errors
    ///
    /// - [`MeetingError::Config`] when no client is configured or the roster
    ///   is empty. Checked before any network call.
    /// - Any error from the completion client, unchanged.
    pub async fn generate_response<R: Rng + ?Sized>(
        &self,
        project: &Project,
        stakeholders: &[Stakeholder],
        history: &[Message],
        user_message: &str,
        rng: &mut R,
        cancel: &CancellationToken,
    ) -> Result<Message> {
        let client = self.client.as_ref().ok_or_else(|| {
            MeetingError::Config(
                "completion client is not configured; set OPENAI_API_KEY or llm.api_key".into(),
            )
        })?;
        if stakeholders.is_empty() {
            return Err(MeetingError::Config("meeting has no stakeholders".into()));
        }

        let (stakeholder, reason) =
            select_speaker_with_reason(stakeholders, user_message, history, rng);
        let flags = TurnFlags {
            is_greeting: is_greeting(user_message),
            is_first_interaction: !has_spoken(stakeholder, history),
        };

        let request = CompletionRequest {
            system_prompt: build_system_prompt(
                project,
                stakeholder,
                history,
                flags,
                self.prompt_history_turns,
            ),
            turns: build_turns(stakeholder, history, user_message, self.request_history_turns),
            sampling: self.sampling,
        };

        let started = Instant::now();
        let content = client.complete(&request, cancel).await?;
        info!(
            stakeholder = %stakeholder.id,
            ?reason,
            backend = client.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "stakeholder reply generated"
        );
        Ok(Message::from_stakeholder(stakeholder, content))
    }
}
