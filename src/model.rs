//! Core meeting data: stakeholders, the project under discussion and messages.
//!
//! Stakeholders and the project are loaded once per session and never
//! mutated. Messages are append-only; the owning [`crate::meeting::Meeting`]
//! keeps them in conversation order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A simulated stakeholder persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stakeholder {
    /// Stable identifier, also the key of the personality profile.
    pub id: String,
    /// Full display name, e.g. `"Marie Dubois"`.
    pub name: String,
    /// Job role, e.g. `"Compliance Officer"`.
    pub role: String,
    /// Department, e.g. `"Risk & Compliance"`.
    pub department: String,
    /// Free-text background.
    #[serde(default)]
    pub bio: String,
    /// Free-text personality description used in the prompt.
    #[serde(default)]
    pub personality: String,
    /// What this stakeholder cares about, most important first.
    #[serde(default)]
    pub priorities: Vec<String>,
    /// Synthesis voice name.
    #[serde(default)]
    pub voice: String,
}

impl Stakeholder {
    /// First whitespace-separated token of the name.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(self.name.as_str())
    }
}

/// The business project the meeting is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    /// Project name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Organisational and market context.
    pub business_context: String,
    /// The problem the learner is analysing.
    pub problem_statement: String,
    /// Desired outcomes.
    pub goals: Vec<String>,
}

/// Who authored a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Speaker {
    /// The learner.
    User,
    /// Meeting notices (joins, errors). Never sent to the model.
    System,
    /// A stakeholder, by id.
    Stakeholder(String),
}

impl Speaker {
    /// Stakeholder id, when authored by a stakeholder.
    pub fn stakeholder_id(&self) -> Option<&str> {
        match self {
            Self::Stakeholder(id) => Some(id),
            _ => None,
        }
    }
}

impl From<String> for Speaker {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => Self::User,
            "system" => Self::System,
            _ => Self::Stakeholder(value),
        }
    }
}

impl From<Speaker> for String {
    fn from(value: Speaker) -> Self {
        match value {
            Speaker::User => "user".to_owned(),
            Speaker::System => "system".to_owned(),
            Speaker::Stakeholder(id) => id,
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::System => write!(f, "system"),
            Self::Stakeholder(id) => write!(f, "{id}"),
        }
    }
}

/// One turn in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message id.
    pub id: String,
    /// Author.
    pub speaker: Speaker,
    /// Message text.
    pub content: String,
    /// Creation time (serialized as RFC 3339).
    pub timestamp: DateTime<Utc>,
    /// Display name, for stakeholder turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stakeholder_name: Option<String>,
    /// Display role, for stakeholder turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stakeholder_role: Option<String>,
}

impl Message {
    fn new(speaker: Speaker, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            speaker,
            content: content.into(),
            timestamp: Utc::now(),
            stakeholder_name: None,
            stakeholder_role: None,
        }
    }

    /// A learner message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Speaker::User, content)
    }

    /// A system notice.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Speaker::System, content)
    }

    /// A stakeholder reply with denormalized display fields.
    pub fn from_stakeholder(stakeholder: &Stakeholder, content: impl Into<String>) -> Self {
        let mut msg = Self::new(Speaker::Stakeholder(stakeholder.id.clone()), content);
        msg.stakeholder_name = Some(stakeholder.name.clone());
        msg.stakeholder_role = Some(stakeholder.role.clone());
        msg
    }

    /// True for learner messages.
    pub fn is_user(&self) -> bool {
        self.speaker == Speaker::User
    }

    /// True for system notices.
    pub fn is_system(&self) -> bool {
        self.speaker == Speaker::System
    }

    /// Name to show next to the message.
    pub fn display_name(&self) -> &str {
        match &self.speaker {
            Speaker::User => "You",
            Speaker::System => "System",
            Speaker::Stakeholder(id) => self.stakeholder_name.as_deref().unwrap_or(id),
        }
    }
}
