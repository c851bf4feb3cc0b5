//! Upstream model capability.
//!
//! `ModelBackend` is the seam between the pipeline and the hosted model
//! service: a request/response call and a request/stream call, both carrying
//! a system prompt, the conversation turns, and a structured-output schema.
//! `OpenAiBackend` implements it against the OpenAI Responses API.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::error::AppError;

use super::phase::PhaseSpec;
use super::types::{ChatMessage, Role, StreamEvent};

/// Abstraction over the hosted model service. Failures propagate as
/// `AppError::Upstream`; retry policy, if any, lives behind this trait.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Request/response mode: returns the complete output text.
    async fn complete(
        &self,
        spec: &PhaseSpec,
        messages: &[ChatMessage],
    ) -> Result<String, AppError>;

    /// Request/stream mode: returns a channel of provider-native incremental
    /// events, in arrival order, closed on stream exhaustion.
    async fn stream(
        &self,
        spec: &PhaseSpec,
        messages: &[ChatMessage],
    ) -> Result<mpsc::Receiver<Result<StreamEvent, AppError>>, AppError>;
}

/// OpenAI Responses API client.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    phase_timeout: std::time::Duration,
}

impl OpenAiBackend {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone(),
            model: config.model.clone(),
            phase_timeout: config.phase_timeout,
        })
    }

    fn request_body(&self, spec: &PhaseSpec, messages: &[ChatMessage], stream: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "input": build_input(&spec.system_prompt, messages),
            "text": { "format": spec.response_format },
            "reasoning": { "effort": "medium" },
        });
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, AppError> {
        let endpoint = format!("{}/responses", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            // Explicit per-phase bound; the upstream service enforces none.
            .timeout(self.phase_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "{} from model API: {}",
                status,
                truncate(&detail, 500)
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    async fn complete(
        &self,
        spec: &PhaseSpec,
        messages: &[ChatMessage],
    ) -> Result<String, AppError> {
        let body = self.request_body(spec, messages, false);
        let response = self.send(&body).await?;
        let payload: Value = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid response body: {e}")))?;
        Ok(response_output_text(&payload))
    }

    async fn stream(
        &self,
        spec: &PhaseSpec,
        messages: &[ChatMessage],
    ) -> Result<mpsc::Receiver<Result<StreamEvent, AppError>>, AppError> {
        let body = self.request_body(spec, messages, true);
        let response = self.send(&body).await?;

        let (tx, rx) = mpsc::channel(64);
        let mut bytes_stream = response.bytes_stream();

        tokio::spawn(async move {
            // SSE lines can be split across chunks; buffer bytes and cut on
            // newlines so UTF-8 is only decoded per complete line.
            let mut buf: Vec<u8> = Vec::new();
            'read: while let Some(chunk) = bytes_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(Err(AppError::Upstream(e.to_string()))).await;
                        return;
                    }
                };
                buf.extend_from_slice(&chunk);

                while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line);
                    match parse_sse_line(&line) {
                        Some(SseLine::Event(event)) => {
                            let terminal = event.event_type == "response.completed";
                            if tx.send(Ok(event)).await.is_err() {
                                return; // receiver dropped
                            }
                            if terminal {
                                break 'read;
                            }
                        }
                        Some(SseLine::Done) => break 'read,
                        None => {}
                    }
                }
            }
            // Channel closes on drop; the consumer treats that as exhaustion.
        });

        Ok(rx)
    }
}

/// Build the `input` array: one synthesized system turn, then the caller
/// turns. Assistant content uses the `output_text` part type, everything
/// else `input_text`.
pub(crate) fn build_input(system_prompt: &str, messages: &[ChatMessage]) -> Value {
    let mut input = vec![json!({
        "role": "system",
        "content": [{ "type": "input_text", "text": system_prompt }],
    })];

    for msg in messages {
        let (role, part_type) = match msg.role {
            Role::Assistant => ("assistant", "output_text"),
            Role::User => ("user", "input_text"),
        };
        input.push(json!({
            "role": role,
            "content": [{ "type": part_type, "text": msg.content }],
        }));
    }

    Value::Array(input)
}

/// Assemble the output text from a non-streaming Responses API payload.
pub(crate) fn response_output_text(payload: &Value) -> String {
    let mut text = String::new();
    if let Some(items) = payload["output"].as_array() {
        for item in items {
            if item["type"] != "message" {
                continue;
            }
            if let Some(parts) = item["content"].as_array() {
                for part in parts {
                    if part["type"] == "output_text" {
                        if let Some(t) = part["text"].as_str() {
                            text.push_str(t);
                        }
                    }
                }
            }
        }
    }
    text
}

pub(crate) enum SseLine {
    Event(StreamEvent),
    Done,
}

/// Parse one SSE line. `event:` lines and blanks are skipped: the payload
/// type is read from the JSON body, which the Responses API always includes.
pub(crate) fn parse_sse_line(line: &str) -> Option<SseLine> {
    let trimmed = line.trim();
    let data = trimmed.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseLine::Done);
    }
    let value: Value = serde_json::from_str(data).ok()?;
    Some(SseLine::Event(StreamEvent {
        event_type: value["type"].as_str().unwrap_or("unknown").to_string(),
        delta: value["delta"].as_str().map(String::from),
    }))
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.len() > max_len {
        let cut = text
            .char_indices()
            .take_while(|(i, _)| *i < max_len)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &text[..cut])
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_input_roles_and_part_types() {
        let messages = vec![
            ChatMessage::user("build an agent"),
            ChatMessage::assistant("Here is a plan."),
        ];
        let input = build_input("system rules", &messages);
        let items = input.as_array().unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["role"], "system");
        assert_eq!(items[0]["content"][0]["type"], "input_text");
        assert_eq!(items[0]["content"][0]["text"], "system rules");
        assert_eq!(items[1]["role"], "user");
        assert_eq!(items[1]["content"][0]["type"], "input_text");
        assert_eq!(items[2]["role"], "assistant");
        assert_eq!(items[2]["content"][0]["type"], "output_text");
    }

    #[test]
    fn test_response_output_text_concatenates_parts() {
        let payload = json!({
            "output": [
                { "type": "reasoning", "summary": [] },
                {
                    "type": "message",
                    "content": [
                        { "type": "output_text", "text": "{\"assistant_text\":" },
                        { "type": "output_text", "text": "\"hi\"}" },
                    ],
                },
            ],
        });
        assert_eq!(
            response_output_text(&payload),
            "{\"assistant_text\":\"hi\"}"
        );
    }

    #[test]
    fn test_response_output_text_empty_payload() {
        assert_eq!(response_output_text(&json!({})), "");
    }

    #[test]
    fn test_parse_sse_delta_line() {
        let line = r#"data: {"type":"response.output_text.delta","delta":"flow"}"#;
        match parse_sse_line(line) {
            Some(SseLine::Event(ev)) => {
                assert_eq!(ev.event_type, "response.output_text.delta");
                assert_eq!(ev.delta.as_deref(), Some("flow"));
            }
            _ => panic!("expected delta event"),
        }
    }

    #[test]
    fn test_parse_sse_skips_event_and_blank_lines() {
        assert!(parse_sse_line("event: response.output_text.delta").is_none());
        assert!(parse_sse_line("").is_none());
        assert!(parse_sse_line(": keep-alive").is_none());
    }

    #[test]
    fn test_parse_sse_done_marker() {
        assert!(matches!(parse_sse_line("data: [DONE]"), Some(SseLine::Done)));
    }
}
