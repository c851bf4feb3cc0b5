//! Context accumulation across phases.
//!
//! Each phase sees the prior phase's full context plus exactly one synthetic
//! turn rendering that phase's result. Prior synthetic turns are never
//! removed — context grows monotonically through the pipeline.

use serde_json::Value;

use super::parser::render_plan;
use super::prompt::PROCESSED_NOTE_PREFIX;
use super::types::{ChatMessage, Role};

/// Synthesize the pre-processed input note from the caller's user turns.
///
/// Returns `None` when the conversation has no user turns (nothing to
/// preprocess). Stands in for the external ingestion/preprocessing step,
/// which is a black box to this service.
pub fn processed_note(messages: &[ChatMessage]) -> Option<ChatMessage> {
    let processed_text = messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.trim())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    if processed_text.is_empty() {
        return None;
    }

    Some(ChatMessage::user(format!(
        "{}\n{}",
        PROCESSED_NOTE_PREFIX, processed_text
    )))
}

/// Synthetic user turn rendering the planner result for the diagram phase.
pub fn plan_turn(plan: &Value) -> ChatMessage {
    ChatMessage::user(render_plan(plan))
}

/// Synthetic user turn rendering the diagram result for the code phase.
pub fn diagram_turn(diagram_mermaid: &str) -> ChatMessage {
    ChatMessage::user(format!("Diagram:\n{}", diagram_mermaid))
}
