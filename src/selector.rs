//! Speaker selection: decides which stakeholder answers a learner message.
//!
//! Tiers are tried in strict priority order and the first match wins:
//!
//! 1. **Name**: first or full name mentioned.
//! 2. **Role**: role or department mentioned.
//! 3. **Greeting rotation**: the stakeholder after the last speaker.
//! 4. **Topic**: a stakeholder whose role, department or priorities fit the topic.
//! 5. **Fairness**: the first stakeholder silent for the last few turns.
//! 6. **Rotation**: the stakeholder after the last speaker.
//! 7. **Random**: anyone.
//!
//! Explicit addressing always beats heuristics; rotation keeps any persona
//! from being starved of turns in group meetings.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::model::{Message, Stakeholder};
use crate::text::{contains_any_word, contains_word, is_greeting};

/// How many recent stakeholder turns the fairness tier looks back over.
pub const FAIRNESS_WINDOW: usize = 4;

/// Topic → trigger keywords. A topic also matches stakeholders whose role,
/// department or priorities mention the topic name or any of its keywords.
const TOPIC_TABLE: &[(&str, &[&str])] = &[
    (
        "technical",
        &[
            "technical",
            "technology",
            "system",
            "systems",
            "software",
            "integration",
            "api",
            "data",
            "database",
            "architecture",
            "infrastructure",
            "security",
        ],
    ),
    (
        "process",
        &[
            "process",
            "workflow",
            "procedure",
            "steps",
            "handoff",
            "approval",
            "bottleneck",
        ],
    ),
    (
        "business",
        &[
            "business",
            "strategy",
            "customer",
            "customers",
            "market",
            "value",
            "revenue",
            "product",
            "requirements",
            "stakeholder",
        ],
    ),
    (
        "operations",
        &[
            "operations",
            "operational",
            "logistics",
            "delivery",
            "service",
            "staff",
            "shift",
            "capacity",
        ],
    ),
    (
        "finance",
        &[
            "finance",
            "financial",
            "budget",
            "cost",
            "costs",
            "roi",
            "spend",
            "funding",
            "forecast",
        ],
    ),
    (
        "hr",
        &[
            "hr",
            "people",
            "training",
            "hiring",
            "recruitment",
            "onboarding",
            "morale",
            "employees",
        ],
    ),
];

/// Which selection tier produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    /// Name mention.
    Name,
    /// Role or department mention.
    Role,
    /// Greeting rotation.
    Greeting,
    /// Topic keyword match.
    Topic,
    /// Fairness rotation.
    Fairness,
    /// Simple rotation.
    Rotation,
    /// Uniform random fallback.
    Random,
}

/// Pick the stakeholder who answers `user_message`.
///
/// `stakeholders` must be non-empty; an empty roster is a caller error and
/// panics. `history` is the conversation so far, oldest first.
pub fn select_speaker<'a, R>(
    stakeholders: &'a [Stakeholder],
    user_message: &str,
    history: &[Message],
    rng: &mut R,
) -> &'a Stakeholder
where
    R: Rng + ?Sized,
{
    select_speaker_with_reason(stakeholders, user_message, history, rng).0
}

/// Like [`select_speaker`], also reporting which tier decided.
pub fn select_speaker_with_reason<'a, R>(
    stakeholders: &'a [Stakeholder],
    user_message: &str,
    history: &[Message],
    rng: &mut R,
) -> (&'a Stakeholder, SelectionReason)
where
    R: Rng + ?Sized,
{
    assert!(!stakeholders.is_empty(), "speaker selection needs a roster");

    let lower = user_message.to_lowercase();

    let (choice, reason) = if let Some(s) = by_name(stakeholders, &lower) {
        (s, SelectionReason::Name)
    } else if let Some(s) = by_role(stakeholders, &lower) {
        (s, SelectionReason::Role)
    } else if is_greeting(user_message) {
        (next_after_last_speaker(stakeholders, history), SelectionReason::Greeting)
    } else if let Some(s) = by_topic(stakeholders, &lower) {
        (s, SelectionReason::Topic)
    } else if let Some(s) = first_unheard(stakeholders, history) {
        (s, SelectionReason::Fairness)
    } else if let Some(s) = rotation(stakeholders, history) {
        (s, SelectionReason::Rotation)
    } else {
        let s = stakeholders.choose(rng).unwrap_or(&stakeholders[0]);
        (s, SelectionReason::Random)
    };

    debug!(stakeholder = %choice.id, ?reason, "selected speaker");
    (choice, reason)
}

fn by_name<'a>(stakeholders: &'a [Stakeholder], lower: &str) -> Option<&'a Stakeholder> {
    stakeholders.iter().find(|s| {
        let full = s.name.to_lowercase();
        let first = s.first_name().to_lowercase();
        lower.contains(&full) || lower.contains(&first)
    })
}

fn by_role<'a>(stakeholders: &'a [Stakeholder], lower: &str) -> Option<&'a Stakeholder> {
    stakeholders.iter().find(|s| {
        let role = s.role.trim().to_lowercase();
        let department = s.department.trim().to_lowercase();
        (!role.is_empty() && lower.contains(&role))
            || (!department.is_empty() && lower.contains(&department))
    })
}

fn by_topic<'a>(stakeholders: &'a [Stakeholder], lower: &str) -> Option<&'a Stakeholder> {
    for &(topic, keywords) in TOPIC_TABLE {
        if !contains_any_word(lower, keywords) {
            continue;
        }
        let found = stakeholders.iter().find(|s| {
            let fields = std::iter::once(s.role.to_lowercase())
                .chain(std::iter::once(s.department.to_lowercase()))
                .chain(s.priorities.iter().map(|p| p.to_lowercase()));
            fields
                .into_iter()
                .any(|field| contains_word(&field, topic) || contains_any_word(&field, keywords))
        });
        if found.is_some() {
            debug!(topic, "topic matched");
            return found;
        }
    }
    None
}

/// Roster index of the most recent stakeholder speaker, if any.
fn last_speaker_index(stakeholders: &[Stakeholder], history: &[Message]) -> Option<usize> {
    let last_id = history
        .iter()
        .rev()
        .find_map(|m| m.speaker.stakeholder_id())?;
    stakeholders.iter().position(|s| s.id == last_id)
}

fn next_after_last_speaker<'a>(
    stakeholders: &'a [Stakeholder],
    history: &[Message],
) -> &'a Stakeholder {
    match last_speaker_index(stakeholders, history) {
        Some(idx) => &stakeholders[(idx + 1) % stakeholders.len()],
        None => &stakeholders[0],
    }
}

fn first_unheard<'a>(
    stakeholders: &'a [Stakeholder],
    history: &[Message],
) -> Option<&'a Stakeholder> {
    let recent: Vec<&str> = history
        .iter()
        .rev()
        .filter_map(|m| m.speaker.stakeholder_id())
        .take(FAIRNESS_WINDOW)
        .collect();
    stakeholders
        .iter()
        .find(|s| !recent.contains(&s.id.as_str()))
}

fn rotation<'a>(stakeholders: &'a [Stakeholder], history: &[Message]) -> Option<&'a Stakeholder> {
    last_speaker_index(stakeholders, history).map(|idx| &stakeholders[(idx + 1) % stakeholders.len()])
}
