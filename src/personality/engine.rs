//! Reply text to personalised SSML.
//!
//! Generation runs in two passes:
//!
//! 1. **Text enhancement**: greeting, filler, transition and acknowledgment
//!    phrases are prepended (each optional and probabilistic).
//! 2. **Markup**: the enhanced text is tokenised into [`Fragment`]s with
//!    pauses and emphasis, then wrapped in voice, style and prosody.
//!
//! All randomness comes from the caller's RNG so a seeded generator
//! reproduces the same SSML. Missing vocabulary never fails generation; the
//! affected step is skipped.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use tracing::debug;

use crate::analysis::{ConversationContext, Emotion, ResponseType, UserMood, is_technical_term};
use crate::config::{EnhancementConfig, MeetingConfig};
use crate::text::{capitalize_first, first_sentence_boundary, prepend_phrase, sentence_count};

use super::ProfileRegistry;
use super::profile::{PersonalityProfile, Prosody};
use super::ssml::{FALLBACK_VOICE, Fragment, SsmlDocument, plain_ssml};
use super::strategy::{EnhancementStrategy, FlatEmphasis, strategy_for};

/// Words that get a short pause before them.
const CONNECTIVES: &[&str] = &[
    "however",
    "but",
    "also",
    "although",
    "therefore",
    "meanwhile",
    "additionally",
    "actually",
    "because",
];

/// Rate multipliers applied per matching context key.
const PACE_TABLE: &[(&str, f32)] = &[
    ("user_confused", 0.9),
    ("user_frustrated", 0.95),
    ("user_excited", 1.05),
    ("technical_explanation", 0.94),
    ("greeting", 1.02),
];

static SIMPLE_GREETING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(hi|hello|hey|hiya|howdy|greetings|good (morning|afternoon|evening))( (there|all|everyone|team|folks))?([\s,.!]+|$)",
    )
    .expect("greeting pattern is a valid regex")
});

/// Which enhancement steps run. Everything is on by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancementOptions {
    /// Replace a plain opening greeting with a profile greeting.
    pub greeting: bool,
    /// Prepend (and sometimes insert) filler phrases.
    pub fillers: bool,
    /// Prepend transition phrases or response-type openers.
    pub transitions: bool,
    /// Prepend acknowledgment phrases.
    pub acknowledgments: bool,
    /// Insert `<break>` markers.
    pub pauses: bool,
    /// Wrap emphasis vocabulary in `<emphasis>`.
    pub emphasis: bool,
    /// Use the profile's per-emotion prosody.
    pub emotional_prosody: bool,
    /// Nudge the rate from the context pace table.
    pub pace_adjustment: bool,
    /// Voice to use when the stakeholder has no profile.
    pub fallback_voice: Option<String>,
}

impl Default for EnhancementOptions {
    fn default() -> Self {
        Self {
            greeting: true,
            fillers: true,
            transitions: true,
            acknowledgments: true,
            pauses: true,
            emphasis: true,
            emotional_prosody: true,
            pace_adjustment: true,
            fallback_voice: None,
        }
    }
}

impl EnhancementOptions {
    /// Every step disabled: profile voice and base prosody only.
    pub fn plain() -> Self {
        Self {
            greeting: false,
            fillers: false,
            transitions: false,
            acknowledgments: false,
            pauses: false,
            emphasis: false,
            emotional_prosody: false,
            pace_adjustment: false,
            fallback_voice: None,
        }
    }

    /// Set the voice used for stakeholders without a profile.
    pub fn with_fallback_voice(mut self, voice: impl Into<String>) -> Self {
        self.fallback_voice = Some(voice.into());
        self
    }
}

/// Bernoulli trial that tolerates out-of-range probabilities.
fn roll<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    if !probability.is_finite() || probability <= 0.0 {
        return false;
    }
    rng.gen_bool(probability.min(1.0))
}

/// Product of the pace-table entries matching `ctx`.
pub fn pace_factor(ctx: &ConversationContext) -> f32 {
    let mut keys = Vec::with_capacity(2);
    match ctx.user_mood {
        UserMood::Confused => keys.push("user_confused"),
        UserMood::Frustrated => keys.push("user_frustrated"),
        UserMood::Excited => keys.push("user_excited"),
        UserMood::Neutral => {}
    }
    keys.push(ctx.response_type.as_str());
    PACE_TABLE
        .iter()
        .filter(|(key, _)| keys.contains(key))
        .map(|(_, factor)| factor)
        .product()
}

/// `mstts:express-as` intensity for an emotion.
pub fn style_degree(emotion: Emotion) -> f32 {
    match emotion {
        Emotion::Excited => 1.5,
        e if e.is_upbeat() => 1.2,
        Emotion::Relaxed => 0.7,
        Emotion::Calm => 0.8,
        _ => 1.0,
    }
}

/// Fragment list that merges adjacent text and adjacent pauses.
#[derive(Default)]
struct Body {
    fragments: Vec<Fragment>,
}

impl Body {
    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Fragment::Text(last)) = self.fragments.last_mut() {
            last.push_str(text);
        } else {
            self.fragments.push(Fragment::Text(text.to_owned()));
        }
    }

    fn pause(&mut self, ms: u32) {
        if ms == 0 {
            return;
        }
        if let Some(Fragment::Break(last)) = self.fragments.last_mut() {
            *last = (*last).max(ms);
        } else {
            self.fragments.push(Fragment::Break(ms));
        }
    }

    fn emphasis(&mut self, level: super::EmphasisLevel, word: &str) {
        self.fragments.push(Fragment::Emphasis(level, word.to_owned()));
    }
}

/// Split a token into leading punctuation, the word and trailing punctuation.
fn split_token(token: &str) -> (&str, &str, &str) {
    let Some(start) = token.find(char::is_alphanumeric) else {
        return (token, "", "");
    };
    let end = token
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_alphanumeric())
        .map_or(token.len(), |(i, c)| i + c.len_utf8());
    (&token[..start], &token[start..end], &token[end..])
}

fn ends_sentence(token: &str) -> bool {
    token
        .trim_end_matches(['"', '\'', ')', ']'])
        .ends_with(['.', '!', '?'])
}

/// Turns stakeholder replies into SSML using their personality profiles.
pub struct PersonalityEngine {
    registry: Arc<ProfileRegistry>,
    strategies: HashMap<String, Box<dyn EnhancementStrategy>>,
    probabilities: EnhancementConfig,
    default_voice: String,
    locale: String,
}

impl std::fmt::Debug for PersonalityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonalityEngine")
            .field("profiles", &self.registry.len())
            .field("probabilities", &self.probabilities)
            .field("default_voice", &self.default_voice)
            .field("locale", &self.locale)
            .finish()
    }
}

impl PersonalityEngine {
    /// Build an engine over `registry` with the given insertion probabilities.
    pub fn new(registry: Arc<ProfileRegistry>, probabilities: EnhancementConfig) -> Self {
        let strategies = registry
            .iter()
            .map(|(id, profile)| (id.to_owned(), strategy_for(profile)))
            .collect();
        Self {
            registry,
            strategies,
            probabilities,
            default_voice: FALLBACK_VOICE.to_owned(),
            locale: "en-US".to_owned(),
        }
    }

    /// Build an engine using the enhancement, voice and locale settings of `config`.
    pub fn from_config(registry: Arc<ProfileRegistry>, config: &MeetingConfig) -> Self {
        Self::new(registry, config.enhancement.clone())
            .with_default_voice(&config.speech.default_voice)
            .with_locale(&config.speech.locale)
    }

    /// Voice for stakeholders with neither a profile nor a fallback voice.
    pub fn with_default_voice(mut self, voice: &str) -> Self {
        if !voice.trim().is_empty() {
            self.default_voice = voice.trim().to_owned();
        }
        self
    }

    /// `xml:lang` of generated documents.
    pub fn with_locale(mut self, locale: &str) -> Self {
        if !locale.trim().is_empty() {
            self.locale = locale.trim().to_owned();
        }
        self
    }

    /// The profile registry.
    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Profile for a stakeholder id.
    pub fn profile(&self, stakeholder_id: &str) -> Option<&PersonalityProfile> {
        self.registry.get(stakeholder_id)
    }

    fn fallback_voice<'a>(&'a self, options: &'a EnhancementOptions) -> &'a str {
        options
            .fallback_voice
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(self.default_voice.as_str())
    }

    /// Generate SSML for `text` spoken by `stakeholder_id`.
    ///
    /// Unknown ids yield minimal SSML wrapping the raw text.
    pub fn generate_personalized_ssml<R: Rng + ?Sized>(
        &self,
        text: &str,
        stakeholder_id: &str,
        ctx: &ConversationContext,
        options: &EnhancementOptions,
        rng: &mut R,
    ) -> String {
        let Some(profile) = self.registry.get(stakeholder_id) else {
            debug!(stakeholder_id, "no personality profile; using plain SSML");
            return plain_ssml(text, self.fallback_voice(options), &self.locale);
        };
        let flat;
        let strategy: &dyn EnhancementStrategy = match self.strategies.get(stakeholder_id) {
            Some(s) => s.as_ref(),
            None => {
                flat = FlatEmphasis::new(&profile.emphasis);
                &flat
            }
        };

        let enhanced = self.enhance_with(text, profile, strategy, ctx, options, rng);
        let prosody = self.resolve_prosody(profile, ctx, options);
        let body = self.mark_up(&enhanced, profile, strategy, ctx, options, rng);
        let voice = if profile.voice.trim().is_empty() {
            self.fallback_voice(options)
        } else {
            profile.voice.as_str()
        };

        let mut doc = SsmlDocument::new(voice, &self.locale).prosody(prosody).body(body);
        if let Some(style) = &profile.express_style {
            doc = doc.express_as(style, style_degree(ctx.emotion));
        }
        let ssml = doc.render();
        debug!(
            stakeholder_id,
            response_type = ctx.response_type.as_str(),
            emotion = ctx.emotion.as_str(),
            bytes = ssml.len(),
            "generated personalised SSML"
        );
        ssml
    }

    /// Run only the text-enhancement pass. Unknown ids return the text unchanged.
    pub fn enhance_text<R: Rng + ?Sized>(
        &self,
        text: &str,
        stakeholder_id: &str,
        ctx: &ConversationContext,
        options: &EnhancementOptions,
        rng: &mut R,
    ) -> String {
        let Some(profile) = self.registry.get(stakeholder_id) else {
            return text.to_owned();
        };
        match self.strategies.get(stakeholder_id) {
            Some(strategy) => self.enhance_with(text, profile, strategy.as_ref(), ctx, options, rng),
            None => {
                let flat = FlatEmphasis::new(&profile.emphasis);
                self.enhance_with(text, profile, &flat, ctx, options, rng)
            }
        }
    }

    /// Prosody for this turn: emotion override (or base), then pace nudging.
    pub fn resolve_prosody(
        &self,
        profile: &PersonalityProfile,
        ctx: &ConversationContext,
        options: &EnhancementOptions,
    ) -> Prosody {
        let prosody = if options.emotional_prosody {
            profile.prosody_for(ctx.emotion)
        } else {
            profile.prosody
        };
        if options.pace_adjustment {
            prosody.with_rate_factor(pace_factor(ctx))
        } else {
            prosody
        }
    }

    fn enhance_with<R: Rng + ?Sized>(
        &self,
        text: &str,
        profile: &PersonalityProfile,
        strategy: &dyn EnhancementStrategy,
        ctx: &ConversationContext,
        options: &EnhancementOptions,
        rng: &mut R,
    ) -> String {
        let p = &self.probabilities;
        let mut out = text.trim().to_owned();
        if out.is_empty() {
            return out;
        }

        if options.greeting
            && ctx.response_type == ResponseType::Greeting
            && let Some(m) = SIMPLE_GREETING.find(&out)
            && let Some(greeting) = profile.greetings.choose(rng)
        {
            let rest = capitalize_first(&out[m.end()..]);
            out = prepend_phrase(greeting, &rest);
        }

        if options.fillers && !profile.fillers.is_empty() {
            let boosted = ctx.response_type == ResponseType::Greeting
                || ctx.complexity > p.complexity_threshold;
            let chance = if boosted { p.filler_boosted } else { p.filler };
            if roll(rng, chance)
                && let Some(filler) = profile.fillers.choose(rng)
            {
                out = prepend_phrase(filler, &out);
            }
            if out.chars().count() > 20
                && sentence_count(&out) > 1
                && roll(rng, p.second_filler)
                && let Some(boundary) = first_sentence_boundary(&out)
                && let Some(filler) = profile.fillers.choose(rng)
            {
                let (head, tail) = out.split_at(boundary);
                out = format!("{head} {}", prepend_phrase(filler, tail));
            }
        }

        if options.transitions {
            let always = matches!(
                ctx.response_type,
                ResponseType::Explanation
                    | ResponseType::TechnicalExplanation
                    | ResponseType::QuestionResponse
            );
            if always || roll(rng, p.transition) {
                let openers = strategy.openers(ctx.response_type);
                let pool: &[String] = if openers.is_empty() {
                    &profile.transitions
                } else {
                    openers
                };
                if let Some(transition) = pool.choose(rng) {
                    out = prepend_phrase(transition, &out);
                }
            }
        }

        if options.acknowledgments {
            let forced = ctx.response_type == ResponseType::Acknowledgment
                || matches!(ctx.user_mood, UserMood::Confused | UserMood::Frustrated);
            if (forced || (!ctx.is_first_message && roll(rng, p.acknowledgment)))
                && let Some(ack) = profile.acknowledgments.choose(rng)
            {
                out = prepend_phrase(ack, &out);
            }
        }

        out
    }

    fn mark_up<R: Rng + ?Sized>(
        &self,
        text: &str,
        profile: &PersonalityProfile,
        strategy: &dyn EnhancementStrategy,
        ctx: &ConversationContext,
        options: &EnhancementOptions,
        rng: &mut R,
    ) -> Vec<Fragment> {
        let pauses = &profile.pauses;
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut body = Body::default();
        if tokens.is_empty() {
            return body.fragments;
        }

        let complex = ctx.complexity > self.probabilities.complexity_threshold
            || ctx.response_type == ResponseType::TechnicalExplanation;
        let breath_at = (options.pauses
            && tokens.len() >= self.probabilities.breath_min_words
            && roll(rng, self.probabilities.breath))
        .then_some(tokens.len() / 2);

        if options.pauses {
            body.pause(if complex { pauses.long } else { pauses.short });
        }

        let mut technical_marked = false;
        let mut first_sentence = true;
        for (i, token) in tokens.iter().enumerate() {
            let (lead, core, trail) = split_token(token);
            let core_lower = core.to_lowercase();

            if options.pauses {
                if i > 0 && breath_at == Some(i) {
                    body.pause(pauses.breath);
                }
                if i > 0 && CONNECTIVES.contains(&core_lower.as_str()) {
                    body.pause(pauses.short);
                }
                if !technical_marked && is_technical_term(token) {
                    body.pause(pauses.long);
                    technical_marked = true;
                }
            }
            if i > 0 {
                body.text(" ");
            }

            match options
                .emphasis
                .then(|| strategy.emphasis_for(&core_lower))
                .flatten()
            {
                Some(level) => {
                    body.text(lead);
                    body.emphasis(level, core);
                    body.text(trail);
                }
                None => body.text(token),
            }

            if options.pauses && i + 1 < tokens.len() {
                if ends_sentence(token) {
                    let greeting_close =
                        first_sentence && ctx.response_type == ResponseType::Greeting;
                    body.pause(if greeting_close {
                        pauses.after_greeting
                    } else {
                        pauses.medium
                    });
                    first_sentence = false;
                } else if token.ends_with([',', ';', ':']) {
                    body.pause(pauses.short);
                }
            }
        }
        body.fragments
    }
}
