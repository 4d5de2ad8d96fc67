//! Simulated stakeholder meetings for requirements-elicitation practice.
//!
//! A learner talks to a roster of AI stakeholders about a business project.
//! Each turn flows through:
//! Learner text → Speaker Selector → Response Generator → Personality Engine → TTS → Playback
//!
//! # Architecture
//!
//! - **Selector**: picks who answers, by name, role, topic and fairness rules
//! - **LLM**: builds a persona prompt and calls a chat-completion API
//! - **Analysis**: classifies the learner's turn into a conversation context
//! - **Personality**: rewrites replies as SSML with fillers, pauses and prosody
//! - **TTS**: cached cloud synthesis with a local speech fallback
//! - **Audio**: an exclusive playback state machine over a pluggable engine

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod llm;
pub mod meeting;
pub mod model;
pub mod personality;
pub mod selector;
pub mod text;
pub mod tts;

pub use config::MeetingConfig;
pub use error::{MeetingError, Result};
pub use meeting::{FailureNote, Meeting, Scenario};
pub use model::{Message, Project, Speaker, Stakeholder};
pub use personality::{EnhancementOptions, PersonalityEngine, ProfileRegistry};
pub use tts::{PersonalizedSpeechService, SpeechOutput, SpeechService};
