//! Platform-native speech fallback.
//!
//! Speaks plain text directly through a local engine (`espeak-ng`, `espeak`
//! or macOS `say`). There is no SSML and no caching: the engine produces
//! sound, not a byte buffer.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::FallbackVoiceConfig;
use crate::error::{MeetingError, Result, with_cancellation};

/// Fixed voice parameters for local speech.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVoiceParams {
    /// Rate multiplier (1.0 = engine default).
    pub rate: f32,
    /// Pitch multiplier (1.0 = engine default).
    pub pitch: f32,
    /// Volume in `0.0..=1.0`.
    pub volume: f32,
    /// Locale, e.g. `"en-US"`.
    pub locale: String,
}

impl From<&FallbackVoiceConfig> for LocalVoiceParams {
    fn from(config: &FallbackVoiceConfig) -> Self {
        Self {
            rate: config.rate,
            pitch: config.pitch,
            volume: config.volume,
            locale: config.locale.clone(),
        }
    }
}

impl Default for LocalVoiceParams {
    fn default() -> Self {
        Self::from(&FallbackVoiceConfig::default())
    }
}

/// A local text-to-speech engine.
#[async_trait]
pub trait LocalSpeech: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Speak `text`, resolving once speech has finished.
    async fn speak(
        &self,
        text: &str,
        params: &LocalVoiceParams,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Which command-line engine is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `espeak-ng`.
    EspeakNg,
    /// Classic `espeak`.
    Espeak,
    /// macOS `say`.
    Say,
}

impl CommandKind {
    fn binary(self) -> &'static str {
        match self {
            Self::EspeakNg => "espeak-ng",
            Self::Espeak => "espeak",
            Self::Say => "say",
        }
    }
}

const ESPEAK_DEFAULT_WPM: f32 = 175.0;
const SAY_DEFAULT_WPM: f32 = 180.0;

/// Local speech through a command-line engine.
#[derive(Debug, Clone)]
pub struct CommandSpeech {
    program: PathBuf,
    kind: CommandKind,
}

impl CommandSpeech {
    /// Use a specific engine binary.
    pub fn new(program: impl Into<PathBuf>, kind: CommandKind) -> Self {
        Self {
            program: program.into(),
            kind,
        }
    }

    /// Find the first installed engine on `PATH`.
    pub fn detect() -> Option<Self> {
        [CommandKind::EspeakNg, CommandKind::Espeak, CommandKind::Say]
            .into_iter()
            .find_map(|kind| {
                which::which(kind.binary())
                    .ok()
                    .map(|program| Self::new(program, kind))
            })
    }

    /// Engine kind.
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Command-line arguments for speaking `text`.
    pub fn args(&self, text: &str, params: &LocalVoiceParams) -> Vec<String> {
        let scale = |value: f32, default: f32| if value.is_finite() { value } else { default };
        match self.kind {
            CommandKind::EspeakNg | CommandKind::Espeak => {
                let wpm = (ESPEAK_DEFAULT_WPM * scale(params.rate, 1.0)).clamp(80.0, 450.0);
                let pitch = (50.0 * scale(params.pitch, 1.0)).clamp(0.0, 99.0);
                let amplitude = (100.0 * scale(params.volume, 1.0)).clamp(0.0, 200.0);
                vec![
                    "-s".into(),
                    format!("{wpm:.0}"),
                    "-p".into(),
                    format!("{pitch:.0}"),
                    "-a".into(),
                    format!("{amplitude:.0}"),
                    "-v".into(),
                    params.locale.to_lowercase(),
                    "--".into(),
                    text.to_owned(),
                ]
            }
            CommandKind::Say => {
                let wpm = (SAY_DEFAULT_WPM * scale(params.rate, 1.0)).clamp(80.0, 450.0);
                vec!["-r".into(), format!("{wpm:.0}"), "--".into(), text.to_owned()]
            }
        }
    }

    async fn run(&self, text: &str, params: &LocalVoiceParams) -> Result<()> {
        let status = tokio::process::Command::new(&self.program)
            .args(self.args(text, params))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MeetingError::LocalSpeechUnsupported(format!(
                    "{} is no longer available",
                    self.program.display()
                )),
                _ => MeetingError::LocalSpeech(format!("cannot start {}: {e}", self.kind.binary())),
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(MeetingError::LocalSpeech(format!(
                "{} exited with {status}",
                self.kind.binary()
            )))
        }
    }
}

#[async_trait]
impl LocalSpeech for CommandSpeech {
    fn name(&self) -> &str {
        self.kind.binary()
    }

    async fn speak(
        &self,
        text: &str,
        params: &LocalVoiceParams,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!(engine = self.kind.binary(), chars = text.len(), "speaking locally");
        with_cancellation(cancel, "local speech", self.run(text, params)).await
    }
}

/// Stand-in when no local engine exists; always reports unsupported.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedSpeech;

#[async_trait]
impl LocalSpeech for UnsupportedSpeech {
    fn name(&self) -> &str {
        "unsupported"
    }

    async fn speak(&self, _: &str, _: &LocalVoiceParams, _: &CancellationToken) -> Result<()> {
        Err(MeetingError::LocalSpeechUnsupported(
            "no local speech engine found (install espeak-ng)".into(),
        ))
    }
}

/// The best local engine on this machine.
pub fn detect_local_speech() -> std::sync::Arc<dyn LocalSpeech> {
    match CommandSpeech::detect() {
        Some(engine) => {
            info!(engine = engine.kind.binary(), "local speech engine available");
            std::sync::Arc::new(engine)
        }
        None => {
            info!("no local speech engine available");
            std::sync::Arc::new(UnsupportedSpeech)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn espeak_args_scale_params() {
        let engine = CommandSpeech::new("/usr/bin/espeak-ng", CommandKind::EspeakNg);
        let params = LocalVoiceParams {
            rate: 1.2,
            pitch: 1.0,
            volume: 0.8,
            locale: "en-US".into(),
        };
        let args = engine.args("Hello there", &params);
        assert_eq!(
            args,
            vec!["-s", "210", "-p", "50", "-a", "80", "-v", "en-us", "--", "Hello there"]
        );
    }

    #[test]
    fn say_args_use_rate_only() {
        let engine = CommandSpeech::new("/usr/bin/say", CommandKind::Say);
        let params = LocalVoiceParams {
            rate: 1.0,
            ..LocalVoiceParams::default()
        };
        assert_eq!(engine.args("Hi", &params), vec!["-r", "180", "--", "Hi"]);
    }

    #[test]
    fn leading_dash_text_is_not_an_option() {
        let engine = CommandSpeech::new("espeak", CommandKind::Espeak);
        let args = engine.args("-v oops", &LocalVoiceParams::default());
        let dash = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(args[dash + 1], "-v oops");
    }

    #[test]
    fn extreme_params_are_clamped() {
        let engine = CommandSpeech::new("espeak", CommandKind::Espeak);
        let params = LocalVoiceParams {
            rate: 100.0,
            pitch: f32::NAN,
            volume: -1.0,
            locale: "en-GB".into(),
        };
        let args = engine.args("x", &params);
        assert_eq!(&args[..6], ["-s", "450", "-p", "50", "-a", "0"]);
    }

    #[tokio::test]
    async fn unsupported_engine_reports_distinct_error() {
        let err = UnsupportedSpeech
            .speak("hi", &LocalVoiceParams::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MeetingError::LocalSpeechUnsupported(_)));
        assert!(!err.is_config());
    }

    #[tokio::test]
    async fn missing_binary_is_unsupported() {
        let engine = CommandSpeech::new("/nonexistent/espeak-ng", CommandKind::EspeakNg);
        let err = engine
            .speak("hi", &LocalVoiceParams::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MeetingError::LocalSpeechUnsupported(_)));
    }
}
