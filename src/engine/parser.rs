//! JSON extraction from model output.
//!
//! Schema-constrained output is expected to be pure JSON, but some models
//! still wrap it in commentary despite instructions. The extractor tolerates
//! leading/trailing noise; anything worse is a `MalformedOutput` error that
//! the pipeline decides how to surface — it is never swallowed here, because
//! the pipeline must distinguish "model returned garbage" from "model
//! returned valid-but-empty fields".

use serde_json::Value;

use crate::error::AppError;

/// Extract one JSON object from `text`.
///
/// Strategy: direct parse first, then the greedy span from the first `{`
/// through the last `}` (which covers multi-line objects and fenced blocks).
pub fn extract_json(text: &str) -> Result<Value, AppError> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    let start = text.find('{');
    let end = text.rfind('}');
    if let (Some(s), Some(e)) = (start, end) {
        if s < e {
            if let Ok(value) = serde_json::from_str::<Value>(&text[s..=e]) {
                return Ok(value);
            }
        }
    }

    Err(AppError::MalformedOutput(format!(
        "no parseable JSON object in model output ({} chars)",
        text.len()
    )))
}

/// Render the plan field as a user-turn body: bullet list when it is an
/// array, raw text otherwise. Non-string items render as compact JSON.
pub fn render_plan(plan: &Value) -> String {
    match plan.as_array() {
        Some(items) => {
            let bullets: Vec<String> = items
                .iter()
                .map(|item| match item.as_str() {
                    Some(s) => s.to_string(),
                    None => item.to_string(),
                })
                .collect();
            format!("Plan:\n- {}", bullets.join("\n- "))
        }
        None => format!("Plan:\n{}", value_as_text(plan)),
    }
}

fn value_as_text(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}
