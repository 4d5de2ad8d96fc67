//! Speech services: cached cloud synthesis with a local fallback.

use std::sync::Arc;

use bytes::Bytes;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::azure::{AzureSpeechClient, SpeechSynthesizer};
use super::cache::{AudioCache, key_for_ssml, key_for_text};
use super::local::{LocalSpeech, LocalVoiceParams, detect_local_speech};
use crate::analysis::ConversationContext;
use crate::config::MeetingConfig;
use crate::error::{MeetingError, Result};
use crate::model::Stakeholder;
use crate::personality::ssml::plain_ssml;
use crate::personality::{EnhancementOptions, PersonalityEngine};

/// What a `speak` call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechOutput {
    /// Encoded audio from the cloud synthesizer, ready for playback.
    Audio(Bytes),
    /// The local engine already spoke the text.
    Spoken,
}

/// Cloud synthesis with caching, plus the local speech fallback.
pub struct SpeechService {
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    local: Arc<dyn LocalSpeech>,
    cache: Arc<AudioCache>,
    default_voice: String,
    locale: String,
    cache_enabled: bool,
    fallback_on_error: bool,
    local_params: LocalVoiceParams,
}

impl std::fmt::Debug for SpeechService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechService")
            .field("synthesizer", &self.synthesizer.as_ref().map(|s| s.name().to_owned()))
            .field("local", &self.local.name())
            .field("cache_entries", &self.cache.len())
            .field("default_voice", &self.default_voice)
            .field("cache_enabled", &self.cache_enabled)
            .field("fallback_on_error", &self.fallback_on_error)
            .finish()
    }
}

impl SpeechService {
    /// Service over explicit backends.
    pub fn new(
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
        local: Arc<dyn LocalSpeech>,
        cache: Arc<AudioCache>,
        config: &MeetingConfig,
    ) -> Self {
        Self {
            synthesizer,
            local,
            cache,
            default_voice: config.speech.default_voice.clone(),
            locale: config.speech.locale.clone(),
            cache_enabled: config.speech.cache_enabled,
            fallback_on_error: config.speech.fallback_on_error,
            local_params: LocalVoiceParams::from(&config.fallback),
        }
    }

    /// Azure synthesis when credentials exist, local engine detection, fresh cache.
    ///
    /// # Errors
    ///
    /// Returns an error only if the HTTP client cannot be built.
    pub fn from_config(config: &MeetingConfig) -> Result<Self> {
        let synthesizer: Option<Arc<dyn SpeechSynthesizer>> = if config.speech.is_configured() {
            Some(Arc::new(AzureSpeechClient::from_config(&config.speech)?))
        } else {
            info!("speech credentials missing; using local speech only");
            None
        };
        Ok(Self::new(
            synthesizer,
            detect_local_speech(),
            Arc::new(AudioCache::new()),
            config,
        ))
    }

    /// Whether the cloud synthesizer is available.
    pub fn is_configured(&self) -> bool {
        self.synthesizer.is_some()
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<AudioCache> {
        &self.cache
    }

    /// Drop every cached clip.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn synthesizer(&self) -> Result<&Arc<dyn SpeechSynthesizer>> {
        self.synthesizer.as_ref().ok_or_else(|| {
            MeetingError::Config(
                "speech synthesis is not configured; set AZURE_SPEECH_KEY and AZURE_SPEECH_REGION"
                    .into(),
            )
        })
    }

    /// Synthesize `text` with `voice` (or the default voice).
    ///
    /// With `use_cache`, identical `(text, voice)` pairs hit the network once.
    ///
    /// # Errors
    ///
    /// [`MeetingError::Config`] before any network call when unconfigured;
    /// otherwise the synthesizer's error.
    pub async fn synthesize_speech(
        &self,
        text: &str,
        voice: Option<&str>,
        use_cache: bool,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let synthesizer = self.synthesizer()?;
        let voice = voice
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(self.default_voice.as_str());
        let key = key_for_text(text, voice);
        let ssml = plain_ssml(text, voice, &self.locale);
        self.cached_synthesis(synthesizer, key, &ssml, use_cache, cancel)
            .await
    }

    /// Synthesize a complete SSML document, cached by its hash.
    ///
    /// # Errors
    ///
    /// Same as [`SpeechService::synthesize_speech`].
    pub async fn synthesize_ssml(
        &self,
        ssml: &str,
        use_cache: bool,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let synthesizer = self.synthesizer()?;
        self.cached_synthesis(synthesizer, key_for_ssml(ssml), ssml, use_cache, cancel)
            .await
    }

    async fn cached_synthesis(
        &self,
        synthesizer: &Arc<dyn SpeechSynthesizer>,
        key: String,
        ssml: &str,
        use_cache: bool,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let caching = use_cache && self.cache_enabled;
        if caching && let Some(audio) = self.cache.get(&key) {
            debug!(bytes = audio.len(), "audio cache hit");
            return Ok(audio);
        }
        let audio = synthesizer.synthesize(ssml, cancel).await?;
        if audio.is_empty() {
            return Err(MeetingError::EmptyAudio(
                "speech synthesis returned no audio".into(),
            ));
        }
        Ok(if caching {
            self.cache.insert(key, audio)
        } else {
            audio
        })
    }

    /// Speak `text` through the local engine. Plain text only, never cached.
    ///
    /// # Errors
    ///
    /// [`MeetingError::LocalSpeechUnsupported`] when no engine exists, or the
    /// engine's failure.
    pub async fn speak_locally(&self, text: &str, cancel: &CancellationToken) -> Result<()> {
        self.local.speak(text, &self.local_params, cancel).await
    }

    /// Cloud audio when configured, otherwise local speech.
    ///
    /// A failed cloud call (other than configuration or cancellation) is
    /// retried once through the local engine when `fallback_on_error` is set.
    /// If that also fails the original cloud error is returned.
    ///
    /// # Errors
    ///
    /// The cloud error, or the local error when only local speech was possible.
    pub async fn speak(
        &self,
        text: &str,
        voice: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<SpeechOutput> {
        if !self.is_configured() {
            self.speak_locally(text, cancel).await?;
            return Ok(SpeechOutput::Spoken);
        }
        match self.synthesize_speech(text, voice, true, cancel).await {
            Ok(audio) => Ok(SpeechOutput::Audio(audio)),
            Err(err) => self.fall_back(text, err, cancel).await,
        }
    }

    async fn fall_back(
        &self,
        text: &str,
        err: MeetingError,
        cancel: &CancellationToken,
    ) -> Result<SpeechOutput> {
        if !self.fallback_on_error || err.is_config() || matches!(err, MeetingError::Cancelled(_))
        {
            return Err(err);
        }
        warn!(error = %err, "cloud synthesis failed; trying local speech");
        match self.speak_locally(text, cancel).await {
            Ok(()) => Ok(SpeechOutput::Spoken),
            Err(local_err) => {
                warn!(error = %local_err, "local speech fallback failed");
                Err(err)
            }
        }
    }
}

/// SSML and audio produced for one stakeholder reply.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonalizedAudio {
    /// The document sent to the synthesizer.
    pub ssml: String,
    /// Encoded audio.
    pub audio: Bytes,
}

/// Personality-aware synthesis sharing the base service's cache.
#[derive(Debug, Clone)]
pub struct PersonalizedSpeechService {
    speech: Arc<SpeechService>,
    engine: Arc<PersonalityEngine>,
}

impl PersonalizedSpeechService {
    /// Combine a speech service and a personality engine.
    pub fn new(speech: Arc<SpeechService>, engine: Arc<PersonalityEngine>) -> Self {
        Self { speech, engine }
    }

    /// The underlying speech service.
    pub fn speech(&self) -> &Arc<SpeechService> {
        &self.speech
    }

    /// The personality engine.
    pub fn engine(&self) -> &Arc<PersonalityEngine> {
        &self.engine
    }

    /// Personalised SSML for a stakeholder reply. Never fails.
    pub fn build_ssml<R: Rng + ?Sized>(
        &self,
        text: &str,
        stakeholder: &Stakeholder,
        ctx: &ConversationContext,
        options: &EnhancementOptions,
        rng: &mut R,
    ) -> String {
        let mut options = options.clone();
        if options.fallback_voice.is_none() && !stakeholder.voice.trim().is_empty() {
            options.fallback_voice = Some(stakeholder.voice.clone());
        }
        self.engine
            .generate_personalized_ssml(text, &stakeholder.id, ctx, &options, rng)
    }

    /// Synthesize a stakeholder reply through the personality engine.
    ///
    /// # Errors
    ///
    /// [`MeetingError::Config`] before any work when the cloud synthesizer
    /// is unconfigured; otherwise the synthesizer's error.
    pub async fn synthesize<R: Rng + ?Sized>(
        &self,
        text: &str,
        stakeholder: &Stakeholder,
        ctx: &ConversationContext,
        options: &EnhancementOptions,
        rng: &mut R,
        cancel: &CancellationToken,
    ) -> Result<PersonalizedAudio> {
        self.speech.synthesizer()?;
        let ssml = self.build_ssml(text, stakeholder, ctx, options, rng);
        let audio = self.speech.synthesize_ssml(&ssml, true, cancel).await?;
        Ok(PersonalizedAudio { ssml, audio })
    }

    /// Like [`PersonalizedSpeechService::synthesize`] but falls back to
    /// local plain-text speech the same way [`SpeechService::speak`] does.
    ///
    /// # Errors
    ///
    /// See [`SpeechService::speak`].
    pub async fn speak<R: Rng + ?Sized>(
        &self,
        text: &str,
        stakeholder: &Stakeholder,
        ctx: &ConversationContext,
        options: &EnhancementOptions,
        rng: &mut R,
        cancel: &CancellationToken,
    ) -> Result<SpeechOutput> {
        if !self.speech.is_configured() {
            self.speech.speak_locally(text, cancel).await?;
            return Ok(SpeechOutput::Spoken);
        }
        match self
            .synthesize(text, stakeholder, ctx, options, rng, cancel)
            .await
        {
            Ok(personalized) => Ok(SpeechOutput::Audio(personalized.audio)),
            Err(err) => self.speech.fall_back(text, err, cancel).await,
        }
    }
}
