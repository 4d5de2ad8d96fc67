//! Lightweight text analysis feeding the personality engine.
//!
//! Everything here is pure and deterministic: the same input always yields
//! the same [`TextAnalysis`]. Randomness lives in the personality engine.
//!
//! Two entry points:
//!
//! - [`analyze_text`]: complexity, sentiment, topics, intent and tone of one text.
//! - [`generate_conversation_context`]: the per-turn [`ConversationContext`]
//!   derived from the learner's message, the history and the speaker's role.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::Message;
use crate::text::{contains_any_word, count_words, word_core};

/// Complexity above which a message counts as complex.
pub const COMPLEXITY_THRESHOLD: f32 = 0.7;

/// How many trailing learner messages the mood scan considers.
const MOOD_WINDOW: usize = 3;

/// How many trailing messages are kept as context text.
const RECENT_WINDOW: usize = 3;

// ── Vocabularies ────────────────────────────────────────────────────────

static TECHNICAL_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(api|apis|database|integration|architecture|algorithm|infrastructure|deployment|server|backend|frontend|microservices?|schema|latency|encryption|authentication|middleware|pipeline|cloud|sql|etl|interface|scalab\w*|kpis?|metrics|requirements?|specification|workflow automation)\b",
    )
    .expect("technical vocabulary is a valid regex")
});

static GREETING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(hi|hello|hey|hiya|howdy|greetings|good (morning|afternoon|evening))\b")
        .expect("greeting pattern is a valid regex")
});

static QUESTION_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(what|why|how|when|where|who|whom|whose|which|can|could|would|should|is|are|do|does|did|will|have|has)\b",
    )
    .expect("question pattern is a valid regex")
});

static EXCITED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\b(excited|exciting|amazing|awesome|fantastic|thrilled|can't wait|love it|great news|brilliant)\b|!{2,})",
    )
    .expect("excitement pattern is a valid regex")
});

const POSITIVE_WORDS: &[&str] = &[
    "good",
    "great",
    "excellent",
    "happy",
    "love",
    "like",
    "appreciate",
    "thanks",
    "thank you",
    "wonderful",
    "amazing",
    "helpful",
    "perfect",
    "glad",
    "pleased",
    "awesome",
    "useful",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad",
    "terrible",
    "awful",
    "hate",
    "problem",
    "problems",
    "issue",
    "issues",
    "wrong",
    "frustrated",
    "annoying",
    "difficult",
    "broken",
    "fail",
    "failed",
    "failure",
    "worried",
    "disappointed",
    "slow",
];

const FRUSTRATION_WORDS: &[&str] = &[
    "frustrated",
    "frustrating",
    "annoyed",
    "annoying",
    "fed up",
    "ridiculous",
    "waste of time",
    "useless",
    "not working",
    "still broken",
    "this is taking forever",
    "unacceptable",
];

const CONFUSION_WORDS: &[&str] = &[
    "confused",
    "confusing",
    "don't understand",
    "do not understand",
    "not sure",
    "unclear",
    "lost",
    "what do you mean",
    "makes no sense",
    "don't get",
];

const REQUEST_WORDS: &[&str] = &[
    "please",
    "could you",
    "would you",
    "can you",
    "i need",
    "i'd like",
    "i would like",
    "help me",
];

const TOPIC_TABLE: &[(Topic, &[&str])] = &[
    (
        Topic::Technical,
        &[
            "system",
            "software",
            "api",
            "database",
            "integration",
            "technical",
            "technology",
            "code",
            "server",
            "data",
            "architecture",
        ],
    ),
    (
        Topic::Customer,
        &[
            "customer",
            "customers",
            "client",
            "clients",
            "user",
            "users",
            "service",
            "experience",
            "complaint",
            "feedback",
        ],
    ),
    (
        Topic::Design,
        &[
            "design",
            "interface",
            "layout",
            "prototype",
            "wireframe",
            "usability",
            "screen",
            "ux",
            "ui",
        ],
    ),
    (
        Topic::Marketing,
        &[
            "marketing",
            "campaign",
            "brand",
            "promotion",
            "audience",
            "market",
            "launch",
            "advertising",
        ],
    ),
    (
        Topic::Process,
        &[
            "process",
            "workflow",
            "procedure",
            "steps",
            "approval",
            "handoff",
            "bottleneck",
            "policy",
        ],
    ),
];

// ── Types ───────────────────────────────────────────────────────────────

/// Overall polarity of a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    /// More positive than negative vocabulary.
    Positive,
    /// More negative than positive vocabulary.
    Negative,
    /// Balanced or no signal.
    Neutral,
}

/// Subject areas detected in a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Systems, data, code.
    Technical,
    /// Customers and service.
    Customer,
    /// Interfaces and UX.
    Design,
    /// Brand and campaigns.
    Marketing,
    /// Workflows and procedures.
    Process,
}

/// What the speaker is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Opens with a greeting.
    Greeting,
    /// Asks something.
    Question,
    /// Complains or vents.
    Complaint,
    /// Politely asks for something.
    Request,
    /// Anything else.
    Statement,
}

/// Emotional colouring of a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalTone {
    /// Enthusiastic.
    Excited,
    /// Annoyed or fed up.
    Frustrated,
    /// Lost or unsure.
    Confused,
    /// Asking or discussing technical matters.
    Engaged,
    /// No signal.
    Neutral,
}

/// Result of [`analyze_text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnalysis {
    /// Complexity score in `[0, 1]`.
    pub complexity: f32,
    /// Overall polarity.
    pub sentiment: Sentiment,
    /// Detected topics, in table order.
    pub topics: Vec<Topic>,
    /// Classified intent.
    pub intent: Intent,
    /// Emotional tone.
    pub emotional_tone: EmotionalTone,
}

/// Kind of reply the stakeholder is giving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Opening a conversation or answering a greeting.
    Greeting,
    /// General explanation.
    Explanation,
    /// Acknowledging a concern.
    Acknowledgment,
    /// Answering a question.
    QuestionResponse,
    /// Explaining something technical or complex.
    TechnicalExplanation,
}

impl ResponseType {
    /// Every response type, in declaration order.
    pub const ALL: [ResponseType; 5] = [
        Self::Greeting,
        Self::Explanation,
        Self::Acknowledgment,
        Self::QuestionResponse,
        Self::TechnicalExplanation,
    ];

    /// Name used as the key of profile openers.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Explanation => "explanation",
            Self::Acknowledgment => "acknowledgment",
            Self::QuestionResponse => "question_response",
            Self::TechnicalExplanation => "technical_explanation",
        }
    }
}

/// Emotion a stakeholder voices a reply with. Keys the profile prosody table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    /// Warm and approachable.
    Friendly,
    /// Upbeat and energetic.
    Excited,
    /// Soft and understanding.
    Empathetic,
    /// Measured and reflective.
    Thoughtful,
    /// Neutral business register.
    Professional,
    /// Assured.
    Confident,
    /// Even and steady.
    Calm,
    /// Easy-going.
    Relaxed,
    /// Inquisitive.
    Curious,
}

impl Emotion {
    /// Every emotion, in declaration order.
    pub const ALL: [Emotion; 9] = [
        Self::Friendly,
        Self::Excited,
        Self::Empathetic,
        Self::Thoughtful,
        Self::Professional,
        Self::Confident,
        Self::Calm,
        Self::Relaxed,
        Self::Curious,
    ];

    /// Name used as the key of profile prosody overrides.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Friendly => "friendly",
            Self::Excited => "excited",
            Self::Empathetic => "empathetic",
            Self::Thoughtful => "thoughtful",
            Self::Professional => "professional",
            Self::Confident => "confident",
            Self::Calm => "calm",
            Self::Relaxed => "relaxed",
            Self::Curious => "curious",
        }
    }

    /// Emotions voiced with extra energy.
    pub fn is_upbeat(self) -> bool {
        matches!(self, Self::Excited | Self::Friendly | Self::Confident | Self::Curious)
    }
}

/// Learner mood inferred from their recent messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserMood {
    /// No signal.
    Neutral,
    /// Annoyed.
    Frustrated,
    /// Lost.
    Confused,
    /// Enthusiastic.
    Excited,
}

/// Per-turn context consumed by the personality engine. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Reply classification.
    pub response_type: ResponseType,
    /// Emotion to voice the reply with.
    pub emotion: Emotion,
    /// Inferred learner mood.
    pub user_mood: UserMood,
    /// Complexity of the learner's message, `[0, 1]`.
    pub complexity: f32,
    /// Whether no stakeholder has spoken yet.
    pub is_first_message: bool,
    /// Text of the last few messages, oldest first.
    pub recent_messages: Vec<String>,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self {
            response_type: ResponseType::Explanation,
            emotion: Emotion::Friendly,
            user_mood: UserMood::Neutral,
            complexity: 0.0,
            is_first_message: false,
            recent_messages: Vec::new(),
        }
    }
}

// ── Analysis ────────────────────────────────────────────────────────────

/// Analyse a single text.
pub fn analyze_text(text: &str) -> TextAnalysis {
    let lower = text.to_lowercase();
    let topics = detect_topics(&lower);
    let intent = classify_intent(text, &lower);
    let emotional_tone = classify_tone(text, &lower, &topics, intent);
    TextAnalysis {
        complexity: complexity(text),
        sentiment: sentiment(&lower),
        topics,
        intent,
        emotional_tone,
    }
}

/// Complexity in `[0, 1]` from word length, sentence length and jargon.
pub fn complexity(text: &str) -> f32 {
    let cores: Vec<&str> = text
        .split_whitespace()
        .map(word_core)
        .filter(|w| !w.is_empty())
        .collect();
    if cores.is_empty() {
        return 0.0;
    }

    let word_count = cores.len() as f32;
    let total_chars: usize = cores.iter().map(|w| w.chars().count()).sum();
    let avg_word_len = total_chars as f32 / word_count;
    let sentences = crate::text::sentence_count(text).max(1) as f32;
    let words_per_sentence = word_count / sentences;
    let technical = if mentions_technical_terms(text) { 0.3 } else { 0.0 };

    let score = (avg_word_len / 10.0).min(1.0) * 0.35
        + (words_per_sentence / 25.0).min(1.0) * 0.35
        + technical;
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Whether `word` belongs to the technical vocabulary.
pub fn is_technical_term(word: &str) -> bool {
    let core = word_core(word);
    !core.is_empty()
        && TECHNICAL_TERMS
            .find(core)
            .is_some_and(|m| m.start() == 0 && m.end() == core.len())
}

fn mentions_technical_terms(text: &str) -> bool {
    TECHNICAL_TERMS.is_match(text)
}

fn sentiment(lower: &str) -> Sentiment {
    let positive = count_words(lower, POSITIVE_WORDS);
    let negative = count_words(lower, NEGATIVE_WORDS);
    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

fn detect_topics(lower: &str) -> Vec<Topic> {
    TOPIC_TABLE
        .iter()
        .filter(|(_, words)| contains_any_word(lower, words))
        .map(|(topic, _)| *topic)
        .collect()
}

fn classify_intent(text: &str, lower: &str) -> Intent {
    if GREETING_PATTERN.is_match(text) {
        Intent::Greeting
    } else if text.trim_end().ends_with('?') || QUESTION_START.is_match(text) {
        Intent::Question
    } else if contains_any_word(lower, FRUSTRATION_WORDS) {
        Intent::Complaint
    } else if contains_any_word(lower, REQUEST_WORDS) {
        Intent::Request
    } else {
        Intent::Statement
    }
}

fn classify_tone(text: &str, lower: &str, topics: &[Topic], intent: Intent) -> EmotionalTone {
    if EXCITED_PATTERN.is_match(text) {
        EmotionalTone::Excited
    } else if contains_any_word(lower, FRUSTRATION_WORDS) {
        EmotionalTone::Frustrated
    } else if contains_any_word(lower, CONFUSION_WORDS) {
        EmotionalTone::Confused
    } else if topics.contains(&Topic::Technical) || intent == Intent::Question {
        EmotionalTone::Engaged
    } else {
        EmotionalTone::Neutral
    }
}

// ── Conversation context ────────────────────────────────────────────────

/// Emotion preferences by role keyword, most preferred first.
const ROLE_EMOTIONS: &[(&[&str], &[Emotion])] = &[
    (
        &["product", "marketing", "sales"],
        &[Emotion::Excited, Emotion::Friendly, Emotion::Confident],
    ),
    (
        &["compliance", "risk", "legal", "audit"],
        &[Emotion::Professional, Emotion::Thoughtful, Emotion::Calm],
    ),
    (
        &["operations", "logistics", "service"],
        &[Emotion::Friendly, Emotion::Relaxed, Emotion::Confident],
    ),
    (
        &["engineer", "developer", "technical", "technology", "architect", "it"],
        &[Emotion::Thoughtful, Emotion::Professional, Emotion::Curious],
    ),
    (
        &["finance", "financial", "accountant", "controller"],
        &[Emotion::Professional, Emotion::Calm, Emotion::Thoughtful],
    ),
    (
        &["hr", "people", "talent"],
        &[Emotion::Friendly, Emotion::Empathetic, Emotion::Calm],
    ),
];

const DEFAULT_EMOTIONS: &[Emotion] = &[Emotion::Friendly, Emotion::Professional, Emotion::Thoughtful];

/// Emotion preferences for a role string.
pub fn role_emotions(role: &str) -> &'static [Emotion] {
    let lower = role.to_lowercase();
    ROLE_EMOTIONS
        .iter()
        .find(|(keys, _)| contains_any_word(&lower, keys))
        .map(|(_, emotions)| *emotions)
        .unwrap_or(DEFAULT_EMOTIONS)
}

/// Infer the learner's mood from their last few messages.
pub fn infer_user_mood(history: &[Message]) -> UserMood {
    let recent: Vec<String> = history
        .iter()
        .rev()
        .filter(|m| m.is_user())
        .take(MOOD_WINDOW)
        .map(|m| m.content.to_lowercase())
        .collect();

    if recent.iter().any(|t| contains_any_word(t, FRUSTRATION_WORDS)) {
        UserMood::Frustrated
    } else if recent.iter().any(|t| contains_any_word(t, CONFUSION_WORDS)) {
        UserMood::Confused
    } else if recent.iter().any(|t| EXCITED_PATTERN.is_match(t)) {
        UserMood::Excited
    } else {
        UserMood::Neutral
    }
}

/// Build the per-turn context for a stakeholder replying to `current_message`.
///
/// `history` holds the messages before the reply (usually ending with
/// `current_message` itself); `stakeholder_role` picks emotion preferences.
pub fn generate_conversation_context(
    current_message: &str,
    history: &[Message],
    stakeholder_role: &str,
) -> ConversationContext {
    let analysis = analyze_text(current_message);
    let is_first_message = !history.iter().any(|m| m.speaker.stakeholder_id().is_some());
    let is_technical = analysis.topics.contains(&Topic::Technical);
    let is_complex = analysis.complexity > COMPLEXITY_THRESHOLD;

    let response_type = if is_first_message || analysis.intent == Intent::Greeting {
        ResponseType::Greeting
    } else if is_technical || is_complex {
        ResponseType::TechnicalExplanation
    } else if analysis.intent == Intent::Question {
        ResponseType::QuestionResponse
    } else if analysis.intent == Intent::Complaint
        || analysis.emotional_tone == EmotionalTone::Frustrated
    {
        ResponseType::Acknowledgment
    } else {
        ResponseType::Explanation
    };

    let mut user_mood = infer_user_mood(history);
    if user_mood == UserMood::Neutral {
        user_mood = match analysis.emotional_tone {
            EmotionalTone::Frustrated => UserMood::Frustrated,
            EmotionalTone::Confused => UserMood::Confused,
            EmotionalTone::Excited => UserMood::Excited,
            _ => UserMood::Neutral,
        };
    }

    let preferences = role_emotions(stakeholder_role);
    let emotion = match user_mood {
        UserMood::Frustrated | UserMood::Confused => Emotion::Empathetic,
        UserMood::Excited if preferences.contains(&Emotion::Excited) => Emotion::Excited,
        UserMood::Excited => Emotion::Friendly,
        UserMood::Neutral if is_complex || is_technical => Emotion::Thoughtful,
        UserMood::Neutral => preferences.first().copied().unwrap_or(Emotion::Friendly),
    };

    let recent_messages = history
        .iter()
        .rev()
        .take(RECENT_WINDOW)
        .rev()
        .map(|m| m.content.clone())
        .collect();

    ConversationContext {
        response_type,
        emotion,
        user_mood,
        complexity: analysis.complexity,
        is_first_message,
        recent_messages,
    }
}
