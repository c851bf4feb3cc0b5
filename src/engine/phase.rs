//! Generation phases and the fixed prompt/schema registry.
//!
//! The pipeline runs three phases in strict order:
//!   Planner -> Diagram -> Code
//!
//! Each phase carries a fixed system prompt and a structured-output schema
//! that constrains the model to emit exactly the fields that phase needs.
//! The registry is built once at startup and never mutated.

use serde::Serialize;
use serde_json::{json, Value};

use super::prompt;

/// The ordered phases of the generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Planner,
    Diagram,
    Code,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: &'static [Phase] = &[Phase::Planner, Phase::Diagram, Phase::Code];

    /// Wire name used in stream events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Planner => "planner",
            Phase::Diagram => "diagram",
            Phase::Code => "code",
        }
    }

    /// Status line emitted with the phase.start event.
    pub fn start_status(&self) -> &'static str {
        match self {
            Phase::Planner => "Planning response",
            Phase::Diagram => "Building diagram",
            Phase::Code => "Generating code",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed (system prompt, output schema) pair for one phase.
#[derive(Debug, Clone)]
pub struct PhaseSpec {
    pub phase: Phase,
    pub system_prompt: String,
    /// Structured-output format descriptor sent verbatim to the model.
    pub response_format: Value,
}

/// Read-only registry of the three phase specs. Constructed once at process
/// start and shared by reference into every pipeline invocation.
#[derive(Debug)]
pub struct PhaseRegistry {
    planner: PhaseSpec,
    diagram: PhaseSpec,
    code: PhaseSpec,
}

impl PhaseRegistry {
    pub fn new() -> Self {
        Self {
            planner: PhaseSpec {
                phase: Phase::Planner,
                system_prompt: prompt::PLANNER_PROMPT.to_string(),
                response_format: json_schema_format(
                    "agent_plan",
                    json!({
                        "type": "object",
                        "properties": {
                            "assistant_text": { "type": "string" },
                            "plan": { "type": "array", "items": { "type": "string" } },
                        },
                        "required": ["assistant_text", "plan"],
                        "additionalProperties": false,
                    }),
                ),
            },
            diagram: PhaseSpec {
                phase: Phase::Diagram,
                system_prompt: prompt::DIAGRAM_PROMPT.to_string(),
                response_format: json_schema_format(
                    "agent_diagram",
                    json!({
                        "type": "object",
                        "properties": {
                            "diagram_mermaid": { "type": "string" },
                        },
                        "required": ["diagram_mermaid"],
                        "additionalProperties": false,
                    }),
                ),
            },
            code: PhaseSpec {
                phase: Phase::Code,
                // The code prompt embeds the base template for reference.
                system_prompt: format!(
                    "{}\n\nBase template (for reference):\n{}",
                    prompt::CODE_PROMPT,
                    prompt::BASE_AGENT_TEMPLATE
                ),
                response_format: json_schema_format(
                    "agent_code",
                    json!({
                        "type": "object",
                        "properties": {
                            "agent_code": { "type": "string" },
                        },
                        "required": ["agent_code"],
                        "additionalProperties": false,
                    }),
                ),
            },
        }
    }

    pub fn spec(&self, phase: Phase) -> &PhaseSpec {
        match phase {
            Phase::Planner => &self.planner,
            Phase::Diagram => &self.diagram,
            Phase::Code => &self.code,
        }
    }
}

impl Default for PhaseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Strict json_schema response format wrapper, as the Responses API expects.
fn json_schema_format(name: &str, schema: Value) -> Value {
    json!({
        "type": "json_schema",
        "name": name,
        "strict": true,
        "schema": schema,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert_eq!(
            Phase::ALL,
            &[Phase::Planner, Phase::Diagram, Phase::Code]
        );
    }

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(Phase::Planner.as_str(), "planner");
        assert_eq!(Phase::Diagram.as_str(), "diagram");
        assert_eq!(Phase::Code.as_str(), "code");
        assert_eq!(
            serde_json::to_string(&Phase::Planner).unwrap(),
            "\"planner\""
        );
    }

    #[test]
    fn test_registry_schemas() {
        let registry = PhaseRegistry::new();

        let planner = registry.spec(Phase::Planner);
        assert_eq!(planner.response_format["name"], "agent_plan");
        assert_eq!(planner.response_format["strict"], true);
        assert_eq!(
            planner.response_format["schema"]["required"],
            serde_json::json!(["assistant_text", "plan"])
        );

        let diagram = registry.spec(Phase::Diagram);
        assert_eq!(diagram.response_format["name"], "agent_diagram");

        let code = registry.spec(Phase::Code);
        assert_eq!(code.response_format["name"], "agent_code");
        // Code prompt carries the base template so the model patches it.
        assert!(code.system_prompt.contains("class Agent"));
    }
}
