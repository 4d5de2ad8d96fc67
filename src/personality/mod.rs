//! Stakeholder voice personalities.
//!
//! A [`PersonalityProfile`] describes how one stakeholder speaks: filler
//! phrases, pauses, prosody per emotion and emphasis vocabulary. Profiles
//! are loaded once into an immutable [`ProfileRegistry`] and shared with the
//! [`PersonalityEngine`], which turns reply text into SSML.
//!
//! Five built-in profiles ship with the binary, compiled from
//! `profiles/stakeholders.toml`. Custom profile files use the same format:
//!
//! ```toml
//! [profiles.james-walker]
//! voice = "en-GB-RyanNeural"
//! fillers = ["um", "you know"]
//! ```

pub mod engine;
pub mod profile;
pub mod ssml;
pub mod strategy;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{MeetingError, Result};

pub use engine::{EnhancementOptions, PersonalityEngine};
pub use profile::{EmphasisTiers, PauseDurations, PersonalityProfile, Prosody};
pub use strategy::{EmphasisLevel, EnhancementStrategy, FlatEmphasis, TieredEmphasis};

/// Built-in profiles, compiled from `profiles/stakeholders.toml`.
pub const BUILTIN_PROFILES: &str = include_str!("../../profiles/stakeholders.toml");

#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profiles: BTreeMap<String, PersonalityProfile>,
}

/// Immutable profile map keyed by stakeholder id.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, PersonalityProfile>,
}

impl ProfileRegistry {
    /// The built-in profiles.
    ///
    /// # Errors
    ///
    /// Returns a config error if the embedded resource is invalid.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_PROFILES)
    }

    /// Parse and validate a profile document.
    ///
    /// # Errors
    ///
    /// Returns [`MeetingError::Config`] on malformed TOML or out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: ProfileFile =
            toml::from_str(source).map_err(|e| MeetingError::Config(format!("profiles: {e}")))?;
        for (id, profile) in &file.profiles {
            profile
                .validate()
                .map_err(|e| MeetingError::Config(format!("profile '{id}': {e}")))?;
        }
        tracing::debug!(count = file.profiles.len(), "loaded personality profiles");
        Ok(Self {
            profiles: file.profiles,
        })
    }

    /// Load a profile document from disk.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a config error if it is invalid.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Build from profiles already in memory.
    pub fn from_profiles(profiles: impl IntoIterator<Item = (String, PersonalityProfile)>) -> Self {
        Self {
            profiles: profiles.into_iter().collect(),
        }
    }

    /// Profile for a stakeholder id.
    pub fn get(&self, id: &str) -> Option<&PersonalityProfile> {
        self.profiles.get(id)
    }

    /// Ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// `(id, profile)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PersonalityProfile)> {
        self.profiles.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// True when no profiles are loaded.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
