//! Configuration types for stakeholder meetings.
//!
//! Every section is `#[serde(default)]`, so a partial TOML file (or none at
//! all) yields a usable configuration. Credentials may come from the file or
//! from the environment via [`MeetingConfig::apply_env_overrides`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for a meeting session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingConfig {
    /// Seed for the session RNG. `None` seeds from OS entropy.
    pub seed: Option<u64>,
    /// Chat-completion settings.
    pub llm: LlmConfig,
    /// Cloud speech-synthesis settings.
    pub speech: SpeechConfig,
    /// Local (platform-native) speech fallback settings.
    pub fallback: FallbackVoiceConfig,
    /// Personality enhancement probabilities.
    pub enhancement: EnhancementConfig,
    /// Audio output settings.
    pub playback: PlaybackConfig,
}

/// Chat-completion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key for the completion provider. Empty or absent means unconfigured.
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible server.
    pub base_url: String,
    /// Model to request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens to generate per reply.
    pub max_tokens: u32,
    /// Presence penalty (discourages returning to the same topics).
    pub presence_penalty: f64,
    /// Frequency penalty (discourages repeated phrasing).
    pub frequency_penalty: f64,
    /// Non-system messages rendered into the system-prompt transcript.
    pub prompt_history_turns: usize,
    /// Non-system messages replayed as chat turns in the request.
    pub request_history_turns: usize,
    /// Request timeout in seconds. `None` leaves the HTTP client default.
    pub timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            temperature: 0.8,
            max_tokens: 300,
            presence_penalty: 0.6,
            frequency_penalty: 0.3,
            prompt_history_turns: 6,
            request_history_turns: 8,
            timeout_secs: None,
        }
    }
}

impl LlmConfig {
    /// Whether a non-blank API key is present.
    pub fn is_configured(&self) -> bool {
        non_blank(self.api_key.as_deref()).is_some()
    }
}

/// Cloud speech-synthesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Subscription key for the synthesis service.
    pub subscription_key: Option<String>,
    /// Service region (e.g. `"eastus"`), used to derive the endpoint.
    pub region: Option<String>,
    /// Full endpoint URL overriding the region-derived one.
    pub endpoint: Option<String>,
    /// Value of the output-format header.
    pub output_format: String,
    /// Voice used when a stakeholder has no personality profile.
    pub default_voice: String,
    /// `xml:lang` of generated SSML.
    pub locale: String,
    /// Request timeout in seconds. `None` leaves the HTTP client default.
    pub timeout_secs: Option<u64>,
    /// Whether synthesized audio is cached by content hash.
    pub cache_enabled: bool,
    /// Retry a failed cloud synthesis through local speech.
    pub fallback_on_error: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            subscription_key: None,
            region: None,
            endpoint: None,
            output_format: "audio-24khz-48kbitrate-mono-mp3".to_owned(),
            default_voice: "en-US-JennyNeural".to_owned(),
            locale: "en-US".to_owned(),
            timeout_secs: None,
            cache_enabled: true,
            fallback_on_error: true,
        }
    }
}

impl SpeechConfig {
    /// Whether both a subscription key and a region (or explicit endpoint) exist.
    pub fn is_configured(&self) -> bool {
        non_blank(self.subscription_key.as_deref()).is_some() && self.resolved_endpoint().is_some()
    }

    /// Synthesis endpoint: explicit override, else derived from the region.
    pub fn resolved_endpoint(&self) -> Option<String> {
        if let Some(endpoint) = non_blank(self.endpoint.as_deref()) {
            return Some(endpoint.trim_end_matches('/').to_owned());
        }
        non_blank(self.region.as_deref()).map(|region| {
            format!("https://{region}.tts.speech.microsoft.com/cognitiveservices/v1")
        })
    }
}

/// Parameters for the local speech fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackVoiceConfig {
    /// Speaking rate multiplier (1.0 = engine default).
    pub rate: f32,
    /// Pitch multiplier (1.0 = engine default).
    pub pitch: f32,
    /// Volume in `0.0..=1.0`.
    pub volume: f32,
    /// Locale of the local voice.
    pub locale: String,
}

impl Default for FallbackVoiceConfig {
    fn default() -> Self {
        Self {
            rate: 0.9,
            pitch: 1.0,
            volume: 0.8,
            locale: "en-US".to_owned(),
        }
    }
}

/// Probability constants for the humanization layer.
///
/// These were tuned by ear, not derived; override them freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    /// Chance of a leading filler phrase.
    pub filler: f64,
    /// Filler chance for greetings and complex replies.
    pub filler_boosted: f64,
    /// Chance of a second filler at the first sentence boundary.
    pub second_filler: f64,
    /// Chance of a transition phrase on turns that do not force one.
    pub transition: f64,
    /// Chance of an acknowledgment on non-first turns that do not force one.
    pub acknowledgment: f64,
    /// Chance of a mid-utterance breath pause.
    pub breath: f64,
    /// Complexity above which a reply counts as complex.
    pub complexity_threshold: f32,
    /// Minimum word count before a breath pause is considered.
    pub breath_min_words: usize,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            filler: 0.85,
            filler_boosted: 0.95,
            second_filler: 0.5,
            transition: 0.7,
            acknowledgment: 0.8,
            breath: 0.3,
            complexity_threshold: 0.7,
            breath_min_words: 12,
        }
    }
}

/// Audio output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Output device name (None = system default).
    pub output_device: Option<String>,
    /// Output sample rate in Hz.
    pub output_sample_rate: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            output_device: None,
            output_sample_rate: 24_000,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl MeetingConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::MeetingError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::MeetingError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path, e.g. `~/.config/stakeholder-voice/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("stakeholder-voice")
            .join("config.toml")
    }

    /// Apply credentials from the process environment.
    ///
    /// Recognised: `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `AZURE_SPEECH_KEY`,
    /// `AZURE_SPEECH_REGION`. Blank values are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = get("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(key) = get("AZURE_SPEECH_KEY") {
            self.speech.subscription_key = Some(key);
        }
        if let Some(region) = get("AZURE_SPEECH_REGION") {
            self.speech.region = Some(region);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_unconfigured_but_valid() {
        let config = MeetingConfig::default();
        assert!(!config.llm.is_configured());
        assert!(!config.speech.is_configured());
        assert!(config.llm.max_tokens > 0);
        assert!(config.llm.temperature > 0.0);
        assert!(config.llm.presence_penalty > 0.0);
        assert!(config.llm.frequency_penalty > 0.0);
        assert!(config.playback.output_sample_rate > 0);
        assert!(config.enhancement.filler >= 0.85);
        assert!(config.enhancement.filler_boosted >= 0.95);
    }

    #[test]
    fn blank_key_is_unconfigured() {
        let llm = LlmConfig {
            api_key: Some("   ".into()),
            ..LlmConfig::default()
        };
        assert!(!llm.is_configured());
    }

    #[test]
    fn speech_needs_key_and_region() {
        let mut speech = SpeechConfig {
            subscription_key: Some("key".into()),
            ..SpeechConfig::default()
        };
        assert!(!speech.is_configured());
        speech.region = Some("westeurope".into());
        assert!(speech.is_configured());
        assert_eq!(
            speech.resolved_endpoint().as_deref(),
            Some("https://westeurope.tts.speech.microsoft.com/cognitiveservices/v1")
        );
    }

    #[test]
    fn explicit_endpoint_wins_over_region() {
        let speech = SpeechConfig {
            subscription_key: Some("key".into()),
            region: Some("eastus".into()),
            endpoint: Some("http://127.0.0.1:9000/tts/".into()),
            ..SpeechConfig::default()
        };
        assert_eq!(
            speech.resolved_endpoint().as_deref(),
            Some("http://127.0.0.1:9000/tts")
        );
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = MeetingConfig::default();
        config.llm.model = "gpt-4o".into();
        config.speech.region = Some("eastus".into());
        config.enhancement.transition = 0.25;
        config.seed = Some(42);
        config.save_to_file(&path).unwrap();

        let loaded = MeetingConfig::from_file(&path).unwrap();
        assert_eq!(loaded.llm.model, "gpt-4o");
        assert_eq!(loaded.speech.region.as_deref(), Some("eastus"));
        assert_eq!(loaded.enhancement.transition, 0.25);
        assert_eq!(loaded.seed, Some(42));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: MeetingConfig = toml::from_str(
            r#"
            [llm]
            model = "gpt-4.1"

            [enhancement]
            breath = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.model, "gpt-4.1");
        assert_eq!(config.llm.max_tokens, 300);
        assert_eq!(config.enhancement.breath, 0.0);
        assert_eq!(config.enhancement.filler, 0.85);
        assert_eq!(config.speech.locale, "en-US");
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[llm\nmodel = ").unwrap();
        let err = MeetingConfig::from_file(&path).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn env_overrides_fill_credentials() {
        let mut config = MeetingConfig::default();
        config.apply_overrides_from(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".into()),
            "AZURE_SPEECH_KEY" => Some("speech-key".into()),
            "AZURE_SPEECH_REGION" => Some("uksouth".into()),
            "OPENAI_BASE_URL" => Some(" ".into()),
            _ => None,
        });
        assert!(config.llm.is_configured());
        assert!(config.speech.is_configured());
        assert_eq!(config.llm.base_url, "https://api.openai.com");
    }

    #[test]
    fn default_config_path_is_named() {
        let path = MeetingConfig::default_config_path();
        assert!(path.ends_with("stakeholder-voice/config.toml"));
    }
}
