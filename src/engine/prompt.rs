//! Fixed prompts, output templates, and fallback content.
//!
//! Everything in this module is an immutable constant. The harness source in
//! `runner.rs` and the prompts here are never derived from caller input.

/// Python agent template shipped as the code phase's starting point and as
/// the fallback `agent_code` when generation fails.
pub const BASE_AGENT_TEMPLATE: &str = r#"import os
from typing import List, Dict

from openai import OpenAI

class Agent:
    def __init__(self, tools: List[str]):
        self.tools = tools
        self.client = OpenAI(api_key=os.getenv("OPENAI_API_KEY"))

    def plan(self, task: str) -> List[Dict[str, str]]:
        return [
            {"step": "analyze", "detail": task},
            {"step": "select_tool", "detail": ", ".join(self.tools)},
            {"step": "execute", "detail": "run selected tools"},
            {"step": "summarize", "detail": "return result"},
        ]

    def call_llm(self, prompt: str) -> str:
        # Placeholder LLM call for the agent pipeline
        resp = self.client.responses.create(
            model="gpt-5-nano-2025-08-07",
            input=[{"role": "user", "content": [{"type": "input_text", "text": prompt}]}],
        )
        return resp.output_text

    def run(self, task: str) -> str:
        plan = self.plan(task)
        _ = self.call_llm(task)
        return "\n".join([f"{p['step']}: {p['detail']}" for p in plan])

if __name__ == "__main__":
    agent = Agent(["search", "codegen", "diagram"])
    print(agent.run("Build a simple agent"))"#;

/// System prompt for the planner phase.
pub const PLANNER_PROMPT: &str = r#"You are the planning assistant for an agent-building system.
Return a strict JSON object with keys:
- assistant_text: short response to the user
- plan: 3-6 bullet points describing the intended agent design and changes

Rules:
- Output must be JSON only (no markdown, no extra text).
- Keep the plan concise and technical.
- Treat data ingestion and preprocessing as a blackbox step named "Ingestion + Preprocess".
- Do not enumerate data sources or ETL details; assume "processed_text" is provided to the LLM.
- Focus only on agent architecture and prompts, not implementation details.
- Make assistant_text friendly, professional, and conversational (1-3 sentences)."#;

/// System prompt for the diagram phase.
pub const DIAGRAM_PROMPT: &str = r#"You are the diagram assistant. Generate a Mermaid flowchart for the agent plan.
Return a strict JSON object with keys:
- diagram_mermaid: a Mermaid flowchart showing agent building blocks

Rules:
- Output must be JSON only (no markdown, no extra text).
- Use Mermaid flowchart syntax like: flowchart LR\n  A[Input] --> B[Planner]
- Include a single blackbox node labeled "Ingestion + Preprocess" and do not expand it.
- Keep node labels short (no colons, no long sentences).
- Prefer 6-8 nodes maximum."#;

/// System prompt for the code phase. The base template is appended by the
/// registry so the model patches it rather than inventing from scratch.
pub const CODE_PROMPT: &str = r#"You are the code assistant. Generate updated Python agent code from the plan.
Return a strict JSON object with keys:
- agent_code: updated Python code based on the base template

Rules:
- Output must be JSON only (no markdown, no extra text).
- Keep agent_code valid Python.
- Modify the base template as needed, but keep it simple and architecture-focused.
- No external libraries or data ingestion logic.
- Include placeholder functions only (no actual plotting or parsing).
- Add a placeholder function `ingest_and_preprocess(text: str) -> str` and call it before the LLM.
- Include an OpenAI Responses API call (like the base template) as the core LLM step.
- The code must define `class Agent` with `run(self, task: str) -> str` so it can be executed by the runner."#;

/// Fallback assistant reply when the blocking pipeline fails.
pub const FALLBACK_ASSISTANT_TEXT: &str = "I had trouble formatting the response. Try again.";

/// Fallback placeholder diagram when the blocking pipeline fails.
pub const FALLBACK_DIAGRAM: &str =
    "flowchart LR\n  A[Input] --> B[Planner] --> C[Tools] --> D[Output]";

/// Prefix marking the synthesized pre-processed input turn. Ingestion and
/// preprocessing are a black box outside this service; the note stands in
/// for its output.
pub const PROCESSED_NOTE_PREFIX: &str = "Processed text (from Ingestion + Preprocess):";
