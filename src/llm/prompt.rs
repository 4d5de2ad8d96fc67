//! Persona prompt construction.

use std::fmt::Write as _;

use super::{ChatTurn, Role};
use crate::model::{Message, Project, Speaker, Stakeholder};

/// Per-turn facts that change the instructions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnFlags {
    /// The learner's message is a greeting.
    pub is_greeting: bool,
    /// The stakeholder has not spoken yet this session.
    pub is_first_interaction: bool,
}

/// Whether `stakeholder` has spoken anywhere in `history`.
pub fn has_spoken(stakeholder: &Stakeholder, history: &[Message]) -> bool {
    history
        .iter()
        .any(|m| m.speaker.stakeholder_id() == Some(stakeholder.id.as_str()))
}

fn non_system(history: &[Message], limit: usize) -> impl Iterator<Item = &Message> {
    let relevant: Vec<&Message> = history.iter().filter(|m| !m.is_system()).collect();
    let skip = relevant.len().saturating_sub(limit);
    relevant.into_iter().skip(skip)
}

/// Render the last `limit` non-system messages as `Name: text` lines.
pub fn render_transcript(history: &[Message], limit: usize) -> String {
    let mut out = String::new();
    for message in non_system(history, limit) {
        let _ = writeln!(out, "{}: {}", message.display_name(), message.content.trim());
    }
    out
}

/// The system prompt for `stakeholder`.
pub fn build_system_prompt(
    project: &Project,
    stakeholder: &Stakeholder,
    history: &[Message],
    flags: TurnFlags,
    transcript_turns: usize,
) -> String {
    let mut p = String::with_capacity(2048);

    let _ = writeln!(
        p,
        "You are {}, {} in the {} department, taking part in a stakeholder meeting with a business analyst.",
        stakeholder.name, stakeholder.role, stakeholder.department
    );
    if !stakeholder.bio.trim().is_empty() {
        let _ = writeln!(p, "Background: {}", stakeholder.bio.trim());
    }
    if !stakeholder.personality.trim().is_empty() {
        let _ = writeln!(p, "Personality: {}", stakeholder.personality.trim());
    }
    if !stakeholder.priorities.is_empty() {
        let _ = writeln!(p, "Your priorities: {}.", stakeholder.priorities.join(", "));
    }

    p.push_str("\nProject context:\n");
    let _ = writeln!(p, "- Name: {}", project.name);
    if !project.description.trim().is_empty() {
        let _ = writeln!(p, "- Description: {}", project.description.trim());
    }
    if !project.business_context.trim().is_empty() {
        let _ = writeln!(p, "- Business context: {}", project.business_context.trim());
    }
    if !project.problem_statement.trim().is_empty() {
        let _ = writeln!(p, "- Problem statement: {}", project.problem_statement.trim());
    }
    if !project.goals.is_empty() {
        let _ = writeln!(p, "- Goals: {}", project.goals.join("; "));
    }

    let transcript = render_transcript(history, transcript_turns);
    if !transcript.is_empty() {
        p.push_str("\nRecent conversation:\n");
        p.push_str(&transcript);
    }

    p.push_str(
        "\nHow to respond:\n\
         - Speak in the first person as yourself, in character, as you would in a real meeting.\n\
         - Keep it to roughly 100 to 200 words.\n\
         - Sound natural and conversational. Occasional fillers like \"well\" or \"you know\" are fine.\n\
         - Avoid robotic phrasing, bullet lists and headings. Never mention being an AI.\n\
         - Answer from your role's perspective and priorities; share concrete details from your work.\n",
    );
    if flags.is_first_interaction {
        p.push_str("- This is your first time speaking in this meeting: briefly introduce yourself and your role.\n");
    }
    if flags.is_greeting {
        p.push_str("- The analyst is greeting the room: greet them back warmly before anything else.\n");
    }
    p
}

/// Request turns: the last `limit` non-system messages, merged into
/// alternating user/assistant turns, then the new learner message.
///
/// Replies by other stakeholders are prefixed with their name so the model
/// can tell the voices apart.
pub fn build_turns(
    stakeholder: &Stakeholder,
    history: &[Message],
    user_message: &str,
    limit: usize,
) -> Vec<ChatTurn> {
    let mut turns: Vec<ChatTurn> = Vec::with_capacity(limit + 1);
    let mut push = |role: Role, content: String| match turns.last_mut() {
        Some(last) if last.role == role => {
            last.content.push_str("\n\n");
            last.content.push_str(&content);
        }
        _ => turns.push(ChatTurn { role, content }),
    };

    for message in non_system(history, limit) {
        match &message.speaker {
            Speaker::User => push(Role::User, message.content.clone()),
            Speaker::Stakeholder(id) if *id == stakeholder.id => {
                push(Role::Assistant, message.content.clone());
            }
            Speaker::Stakeholder(_) => push(
                Role::Assistant,
                format!("{}: {}", message.display_name(), message.content),
            ),
            Speaker::System => {}
        }
    }
    push(Role::User, user_message.to_owned());
    turns
}
