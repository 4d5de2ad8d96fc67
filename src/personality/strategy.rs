//! Per-profile enhancement strategies.
//!
//! Most profiles emphasise a flat word list. Profiles that carry emphasis
//! tiers or response-type openers get [`TieredEmphasis`] instead; the engine
//! never branches on stakeholder identity.

use std::collections::{BTreeMap, HashMap};

use crate::analysis::ResponseType;

use super::profile::PersonalityProfile;

/// SSML emphasis strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmphasisLevel {
    /// `level="strong"`.
    Strong,
    /// `level="moderate"`.
    Moderate,
    /// `level="reduced"`.
    Reduced,
}

impl EmphasisLevel {
    /// SSML attribute value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Moderate => "moderate",
            Self::Reduced => "reduced",
        }
    }
}

/// Profile-specific enhancement behaviour.
pub trait EnhancementStrategy: Send + Sync {
    /// Emphasis for a lowercase word, if it should be emphasised.
    fn emphasis_for(&self, word: &str) -> Option<EmphasisLevel>;

    /// Openers for a response type, preferred over generic transitions.
    fn openers(&self, response_type: ResponseType) -> &[String];
}

fn lowercase_all(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Every emphasis word at `moderate`; no openers.
#[derive(Debug, Clone, Default)]
pub struct FlatEmphasis {
    words: Vec<String>,
}

impl FlatEmphasis {
    /// Build from an emphasis word list.
    pub fn new(words: &[String]) -> Self {
        Self {
            words: lowercase_all(words),
        }
    }
}

impl EnhancementStrategy for FlatEmphasis {
    fn emphasis_for(&self, word: &str) -> Option<EmphasisLevel> {
        self.words
            .iter()
            .any(|w| w == word)
            .then_some(EmphasisLevel::Moderate)
    }

    fn openers(&self, _response_type: ResponseType) -> &[String] {
        &[]
    }
}

/// Tiered emphasis plus response-type openers.
#[derive(Debug, Clone, Default)]
pub struct TieredEmphasis {
    levels: HashMap<String, EmphasisLevel>,
    openers: BTreeMap<String, Vec<String>>,
}

impl TieredEmphasis {
    /// Build from a profile's tiers, flat list and openers.
    ///
    /// A word listed in several tiers takes the strongest level.
    pub fn new(profile: &PersonalityProfile) -> Self {
        let mut levels = HashMap::new();
        let mut add = |words: &[String], level: EmphasisLevel| {
            for word in lowercase_all(words) {
                levels.entry(word).or_insert(level);
            }
        };
        if let Some(tiers) = &profile.emphasis_tiers {
            add(&tiers.positive, EmphasisLevel::Strong);
            add(&tiers.curious, EmphasisLevel::Moderate);
            add(&tiers.professional, EmphasisLevel::Reduced);
        }
        add(&profile.emphasis, EmphasisLevel::Moderate);
        Self {
            levels,
            openers: profile.openers.clone(),
        }
    }
}

impl EnhancementStrategy for TieredEmphasis {
    fn emphasis_for(&self, word: &str) -> Option<EmphasisLevel> {
        self.levels.get(word).copied()
    }

    fn openers(&self, response_type: ResponseType) -> &[String] {
        self.openers
            .get(response_type.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Pick the strategy a profile calls for.
pub fn strategy_for(profile: &PersonalityProfile) -> Box<dyn EnhancementStrategy> {
    if profile.has_rich_templates() {
        Box::new(TieredEmphasis::new(profile))
    } else {
        Box::new(FlatEmphasis::new(&profile.emphasis))
    }
}
