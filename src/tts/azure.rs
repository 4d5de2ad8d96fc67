//! Cloud speech synthesis over the Azure Speech REST API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::SpeechConfig;
use crate::error::{MeetingError, Result, with_cancellation};
use crate::llm::openai::map_transport_error;

const SERVICE: &str = "speech synthesis";
const USER_AGENT: &str = concat!("stakeholder-voice/", env!("CARGO_PKG_VERSION"));

/// Turns an SSML document into encoded audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Synthesize `ssml`.
    ///
    /// Implementations must honour `cancel` and treat an empty success body
    /// as [`MeetingError::EmptyAudio`].
    async fn synthesize(&self, ssml: &str, cancel: &CancellationToken) -> Result<Bytes>;
}

/// Azure Speech text-to-speech client.
pub struct AzureSpeechClient {
    endpoint: String,
    subscription_key: String,
    output_format: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AzureSpeechClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureSpeechClient")
            .field("endpoint", &self.endpoint)
            .field("output_format", &self.output_format)
            .field("subscription_key", &"<redacted>")
            .finish()
    }
}

impl AzureSpeechClient {
    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MeetingError::Config`] when the subscription key or the
    /// region/endpoint is missing.
    pub fn from_config(config: &SpeechConfig) -> Result<Self> {
        let subscription_key = config
            .subscription_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                MeetingError::Config("speech subscription key is not configured".into())
            })?;
        let endpoint = config.resolved_endpoint().ok_or_else(|| {
            MeetingError::Config("speech region or endpoint is not configured".into())
        })?;

        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| MeetingError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            endpoint,
            subscription_key: subscription_key.to_owned(),
            output_format: config.output_format.clone(),
            client,
        })
    }

    /// The synthesis URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, ssml: &str) -> Result<Bytes> {
        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .header("X-Microsoft-OutputFormat", &self.output_format)
            .header(reqwest::header::CONTENT_TYPE, "application/ssml+xml")
            .body(ssml.to_owned())
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(MeetingError::from_status(SERVICE, status.as_u16(), &detail));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| MeetingError::Transport(format!("reading synthesized audio: {e}")))?;
        if audio.is_empty() {
            return Err(MeetingError::EmptyAudio(
                "speech synthesis returned no audio".into(),
            ));
        }
        info!(
            bytes = audio.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "speech synthesized"
        );
        Ok(audio)
    }
}

#[async_trait]
impl SpeechSynthesizer for AzureSpeechClient {
    fn name(&self) -> &str {
        "azure"
    }

    async fn synthesize(&self, ssml: &str, cancel: &CancellationToken) -> Result<Bytes> {
        debug!(ssml_chars = ssml.len(), "sending synthesis request");
        with_cancellation(cancel, "speech synthesis", self.send(ssml)).await
    }
}
