use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::phase::Phase;

/// Caller-visible message roles. System turns are synthesized internally per
/// phase and never originate from the caller, so they are not on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

/// Aggregate outcome of a blocking pipeline run. `raw_text` carries the
/// diagnostic when the fixed fallback was substituted, `None` on success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub assistant_text: String,
    pub diagram_mermaid: String,
    pub agent_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub agent_code: String,
    pub prompt: String,
    #[serde(default)]
    pub tools: Option<Vec<String>>,
}

/// Uniform execution outcome. `ok` is true iff the subprocess exited 0; the
/// other fields are always populated regardless of outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResponse {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// One provider-native incremental event from the upstream stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// Provider event type, e.g. "response.output_text.delta".
    pub event_type: String,
    /// Text fragment, present on delta events.
    pub delta: Option<String>,
}

/// Parsed structured fields of one completed phase. Missing fields default
/// to empty rather than failing the phase.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutput {
    Plan {
        assistant_text: String,
        /// Kept as raw JSON: the schema asks for an array of strings, but a
        /// scalar still renders (as raw text) instead of failing.
        plan: Value,
    },
    Diagram {
        diagram_mermaid: String,
    },
    Code {
        agent_code: String,
    },
}

impl PhaseOutput {
    /// Build from an extracted JSON object, applying empty defaults.
    pub fn from_value(phase: Phase, value: &Value) -> Self {
        match phase {
            Phase::Planner => PhaseOutput::Plan {
                assistant_text: string_field(value, "assistant_text"),
                plan: value.get("plan").cloned().unwrap_or_else(|| json!([])),
            },
            Phase::Diagram => PhaseOutput::Diagram {
                diagram_mermaid: string_field(value, "diagram_mermaid"),
            },
            Phase::Code => PhaseOutput::Code {
                agent_code: string_field(value, "agent_code"),
            },
        }
    }

    /// The phase's fields as a JSON object, merged into phase.done events.
    pub fn fields(&self) -> Value {
        match self {
            PhaseOutput::Plan {
                assistant_text,
                plan,
            } => json!({ "assistant_text": assistant_text, "plan": plan }),
            PhaseOutput::Diagram { diagram_mermaid } => {
                json!({ "diagram_mermaid": diagram_mermaid })
            }
            PhaseOutput::Code { agent_code } => json!({ "agent_code": agent_code }),
        }
    }
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Tagged progress event pushed through the streaming channel. Serialized
/// shape matches the SSE wire format the frontend consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Start-of-phase marker.
    PhaseStart { phase: Phase },
    /// One provider-native event, forwarded verbatim with its owning phase.
    Delta {
        phase: Phase,
        event_type: String,
        delta: Option<String>,
    },
    /// End-of-phase marker carrying the parsed fields.
    PhaseDone { phase: Phase, output: PhaseOutput },
    /// Terminal success marker after all three phases.
    AllDone,
    /// Terminal failure marker. Phases emitted before it remain valid.
    Error { message: String },
}

impl PipelineEvent {
    /// SSE event name: "error" for the terminal error, "message" otherwise.
    pub fn sse_event_name(&self) -> &'static str {
        match self {
            PipelineEvent::Error { .. } => "error",
            _ => "message",
        }
    }

    /// JSON payload in the frontend wire format.
    pub fn to_json(&self) -> Value {
        match self {
            PipelineEvent::PhaseStart { phase } => json!({
                "phase": phase.as_str(),
                "type": "phase.start",
                "status": phase.start_status(),
            }),
            PipelineEvent::Delta {
                phase,
                event_type,
                delta,
            } => json!({
                "phase": phase.as_str(),
                "type": event_type,
                "delta": delta,
            }),
            PipelineEvent::PhaseDone { phase, output } => {
                let mut payload = json!({
                    "phase": phase.as_str(),
                    "type": "phase.done",
                });
                let fields = output.fields();
                if let (Some(obj), Some(fields)) = (payload.as_object_mut(), fields.as_object()) {
                    for (k, v) in fields {
                        obj.insert(k.clone(), v.clone());
                    }
                }
                payload
            }
            PipelineEvent::AllDone => json!({ "phase": "all", "type": "all.done" }),
            PipelineEvent::Error { message } => json!({ "error": message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"user","content":"build an agent"}"#).unwrap();
        assert_eq!(msg.role, Role::User);

        // System turns are internal only; the wire rejects them.
        let system = serde_json::from_str::<ChatMessage>(r#"{"role":"system","content":"x"}"#);
        assert!(system.is_err());
    }

    #[test]
    fn test_phase_output_defaults_missing_fields() {
        let out = PhaseOutput::from_value(Phase::Planner, &json!({}));
        assert_eq!(
            out,
            PhaseOutput::Plan {
                assistant_text: String::new(),
                plan: json!([]),
            }
        );

        let out = PhaseOutput::from_value(Phase::Code, &json!({ "other": 1 }));
        assert_eq!(
            out,
            PhaseOutput::Code {
                agent_code: String::new()
            }
        );
    }

    #[test]
    fn test_phase_start_event_shape() {
        let ev = PipelineEvent::PhaseStart {
            phase: Phase::Planner,
        };
        assert_eq!(ev.sse_event_name(), "message");
        assert_eq!(
            ev.to_json(),
            json!({ "phase": "planner", "type": "phase.start", "status": "Planning response" })
        );
    }

    #[test]
    fn test_delta_event_forwards_provider_type() {
        let ev = PipelineEvent::Delta {
            phase: Phase::Diagram,
            event_type: "response.output_text.delta".into(),
            delta: Some("flow".into()),
        };
        assert_eq!(
            ev.to_json(),
            json!({
                "phase": "diagram",
                "type": "response.output_text.delta",
                "delta": "flow",
            })
        );
    }

    #[test]
    fn test_phase_done_event_merges_fields() {
        let ev = PipelineEvent::PhaseDone {
            phase: Phase::Planner,
            output: PhaseOutput::Plan {
                assistant_text: "Here is the plan.".into(),
                plan: json!(["step one", "step two"]),
            },
        };
        assert_eq!(
            ev.to_json(),
            json!({
                "phase": "planner",
                "type": "phase.done",
                "assistant_text": "Here is the plan.",
                "plan": ["step one", "step two"],
            })
        );
    }

    #[test]
    fn test_terminal_events() {
        assert_eq!(
            PipelineEvent::AllDone.to_json(),
            json!({ "phase": "all", "type": "all.done" })
        );

        let err = PipelineEvent::Error {
            message: "upstream failed".into(),
        };
        assert_eq!(err.sse_event_name(), "error");
        assert_eq!(err.to_json(), json!({ "error": "upstream failed" }));
    }

    #[test]
    fn test_chat_response_omits_empty_raw_text() {
        let resp = ChatResponse {
            assistant_text: "hi".into(),
            diagram_mermaid: "flowchart LR".into(),
            agent_code: "class Agent: ...".into(),
            raw_text: None,
        };
        let v = serde_json::to_value(&resp).unwrap();
        assert!(v.get("raw_text").is_none());
    }
}
