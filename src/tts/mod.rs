//! Text-to-speech for stakeholder replies.
//!
//! Replies are rendered to SSML (plain or personalised), synthesized by a
//! cloud [`SpeechSynthesizer`] and cached in a shared [`AudioCache`]. When
//! the cloud path is unconfigured or fails, a [`LocalSpeech`] engine speaks
//! the plain text instead.

pub mod azure;
pub mod cache;
pub mod local;
pub mod service;

pub use azure::{AzureSpeechClient, SpeechSynthesizer};
pub use cache::{AudioCache, CacheStats};
pub use local::{CommandSpeech, LocalSpeech, LocalVoiceParams, UnsupportedSpeech};
pub use service::{PersonalizedAudio, PersonalizedSpeechService, SpeechOutput, SpeechService};
