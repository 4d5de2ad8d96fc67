//! Personality profile schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{Emotion, ResponseType};

/// Prosody settings for one utterance.
///
/// `rate` is a speed multiplier (1.0 = normal). `pitch` and `volume` are
/// relative percentage offsets (0.0 = unchanged).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prosody {
    /// Speed multiplier.
    pub rate: f32,
    /// Pitch offset in percent.
    pub pitch: f32,
    /// Volume offset in percent.
    pub volume: f32,
}

impl Default for Prosody {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 0.0,
            volume: 0.0,
        }
    }
}

impl Prosody {
    /// Return a copy with the rate scaled by `factor`, kept within `[0.5, 2.0]`.
    pub fn with_rate_factor(self, factor: f32) -> Self {
        let rate = (self.rate * factor).clamp(0.5, 2.0);
        Self {
            rate: if rate.is_finite() { rate } else { 1.0 },
            ..self
        }
    }

    /// SSML `rate` attribute, e.g. `"-10%"`.
    pub fn rate_attr(&self) -> String {
        percent_attr((self.rate - 1.0) * 100.0)
    }

    /// SSML `pitch` attribute, e.g. `"+2%"`.
    pub fn pitch_attr(&self) -> String {
        percent_attr(self.pitch)
    }

    /// SSML `volume` attribute, e.g. `"+0%"`.
    pub fn volume_attr(&self) -> String {
        percent_attr(self.volume)
    }
}

fn percent_attr(value: f32) -> String {
    let value = if value.is_finite() { value.round() } else { 0.0 };
    // Avoid "-0%".
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{value:+.0}%")
}

/// Named pause lengths in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PauseDurations {
    /// After commas and before connectives.
    pub short: u32,
    /// After sentences.
    pub medium: u32,
    /// Before complex content.
    pub long: u32,
    /// After the opening sentence of a greeting.
    pub after_greeting: u32,
    /// Mid-utterance breath.
    pub breath: u32,
}

impl Default for PauseDurations {
    fn default() -> Self {
        Self {
            short: 200,
            medium: 400,
            long: 700,
            after_greeting: 500,
            breath: 300,
        }
    }
}

/// Emphasis vocabulary split by semantic category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmphasisTiers {
    /// Enthusiastic words, emphasised strongly.
    pub positive: Vec<String>,
    /// Inquisitive words, emphasised moderately.
    pub curious: Vec<String>,
    /// Business terms, emphasised lightly.
    pub professional: Vec<String>,
}

impl EmphasisTiers {
    /// True when no tier has any words.
    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.curious.is_empty() && self.professional.is_empty()
    }
}

/// How one stakeholder sounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalityProfile {
    /// Descriptive speech style tag, e.g. `"warm-direct"`.
    pub style: String,
    /// Synthesis voice name. Empty means the service default.
    pub voice: String,
    /// Optional `mstts:express-as` style, e.g. `"cheerful"`.
    pub express_style: Option<String>,
    /// Hesitation phrases ("um", "you know").
    pub fillers: Vec<String>,
    /// Greeting phrases.
    pub greetings: Vec<String>,
    /// Transition phrases ("So", "Right").
    pub transitions: Vec<String>,
    /// Acknowledgment phrases ("I hear you.").
    pub acknowledgments: Vec<String>,
    /// Pause table.
    pub pauses: PauseDurations,
    /// Base prosody.
    pub prosody: Prosody,
    /// Prosody overrides keyed by emotion name (`"excited"`, `"calm"`...).
    pub emotions: BTreeMap<String, Prosody>,
    /// Words to emphasise at the default level.
    pub emphasis: Vec<String>,
    /// Optional finer-grained emphasis.
    pub emphasis_tiers: Option<EmphasisTiers>,
    /// Openers keyed by response type name, preferred over transitions.
    pub openers: BTreeMap<String, Vec<String>>,
    /// Descriptive trait weights in `[0, 1]` (formality, warmth...).
    pub traits: BTreeMap<String, f32>,
}

impl Default for PersonalityProfile {
    fn default() -> Self {
        Self {
            style: "neutral".to_owned(),
            voice: String::new(),
            express_style: None,
            fillers: Vec::new(),
            greetings: Vec::new(),
            transitions: Vec::new(),
            acknowledgments: Vec::new(),
            pauses: PauseDurations::default(),
            prosody: Prosody::default(),
            emotions: BTreeMap::new(),
            emphasis: Vec::new(),
            emphasis_tiers: None,
            openers: BTreeMap::new(),
            traits: BTreeMap::new(),
        }
    }
}

impl PersonalityProfile {
    /// Prosody for `emotion`, falling back to the base prosody.
    pub fn prosody_for(&self, emotion: Emotion) -> Prosody {
        self.emotions
            .get(emotion.as_str())
            .copied()
            .unwrap_or(self.prosody)
    }

    /// Whether the profile needs the tiered enhancement strategy.
    pub fn has_rich_templates(&self) -> bool {
        self.emphasis_tiers.as_ref().is_some_and(|t| !t.is_empty())
            || self.openers.values().any(|v| !v.is_empty())
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        for (name, weight) in &self.traits {
            if !(0.0..=1.0).contains(weight) {
                return Err(format!("trait '{name}' weight {weight} is outside [0, 1]"));
            }
        }
        let all = std::iter::once(("base", &self.prosody))
            .chain(self.emotions.iter().map(|(k, v)| (k.as_str(), v)));
        for (name, prosody) in all {
            if !(prosody.rate.is_finite() && prosody.rate > 0.0) {
                return Err(format!("prosody '{name}' rate must be positive"));
            }
        }
        let tiers = self
            .emphasis_tiers
            .iter()
            .flat_map(|t| t.positive.iter().chain(&t.curious).chain(&t.professional));
        if let Some(word) = self
            .emphasis
            .iter()
            .chain(tiers)
            .find(|w| w.trim().contains(char::is_whitespace))
        {
            return Err(format!("emphasis entry '{word}' must be a single word"));
        }
        for key in self.emotions.keys() {
            if !Emotion::ALL.iter().any(|e| e.as_str() == key) {
                return Err(format!("unknown emotion '{key}'"));
            }
        }
        for key in self.openers.keys() {
            if !ResponseType::ALL.iter().any(|t| t.as_str() == key) {
                return Err(format!("unknown response type '{key}' in openers"));
            }
        }
        Ok(())
    }
}
