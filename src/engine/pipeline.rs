//! Three-phase generation pipeline: planner -> diagram -> code.
//!
//! Phases are strictly sequential — each phase's prompt is only meaningful
//! given the previous phase's concrete output. Blocking mode substitutes a
//! fixed, always-renderable fallback outcome on failure; streaming mode
//! surfaces failure as a single terminal error event. No retries happen at
//! this layer.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::AppError;

use super::context::{diagram_turn, plan_turn, processed_note};
use super::parser::extract_json;
use super::phase::{Phase, PhaseRegistry, PhaseSpec};
use super::prompt::{BASE_AGENT_TEMPLATE, FALLBACK_ASSISTANT_TEXT, FALLBACK_DIAGRAM};
use super::provider::ModelBackend;
use super::types::{ChatMessage, ChatResponse, PhaseOutput, PipelineEvent};

/// Provider event type carrying output text fragments.
const OUTPUT_TEXT_DELTA: &str = "response.output_text.delta";

/// Raw-output log cap, matching what fits usefully in a log line.
const RAW_LOG_LIMIT: usize = 2000;

/// Run the pipeline in blocking mode. Always returns a renderable response:
/// on failure the fixed fallback is substituted and `raw_text` carries the
/// diagnostic.
pub async fn run_chat(
    registry: &PhaseRegistry,
    backend: &dyn ModelBackend,
    messages: Vec<ChatMessage>,
) -> ChatResponse {
    let request_id = Uuid::new_v4();
    match run_phases(registry, backend, messages).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(%request_id, error = %err, kind = err.kind(), "chat pipeline failed, returning fallback");
            ChatResponse {
                assistant_text: FALLBACK_ASSISTANT_TEXT.to_string(),
                diagram_mermaid: FALLBACK_DIAGRAM.to_string(),
                agent_code: BASE_AGENT_TEMPLATE.to_string(),
                raw_text: Some(err.to_string()),
            }
        }
    }
}

async fn run_phases(
    registry: &PhaseRegistry,
    backend: &dyn ModelBackend,
    messages: Vec<ChatMessage>,
) -> Result<ChatResponse, AppError> {
    let mut context = messages;
    if let Some(note) = processed_note(&context) {
        context.push(note);
    }

    let (assistant_text, plan) =
        match run_phase(backend, registry.spec(Phase::Planner), &context).await? {
            PhaseOutput::Plan {
                assistant_text,
                plan,
            } => (assistant_text, plan),
            _ => unreachable!("planner phase yields plan output"),
        };

    context.push(plan_turn(&plan));
    let diagram_mermaid = match run_phase(backend, registry.spec(Phase::Diagram), &context).await? {
        PhaseOutput::Diagram { diagram_mermaid } => diagram_mermaid,
        _ => unreachable!("diagram phase yields diagram output"),
    };

    context.push(diagram_turn(&diagram_mermaid));
    let agent_code = match run_phase(backend, registry.spec(Phase::Code), &context).await? {
        PhaseOutput::Code { agent_code } => agent_code,
        _ => unreachable!("code phase yields code output"),
    };

    Ok(ChatResponse {
        assistant_text,
        diagram_mermaid,
        agent_code,
        raw_text: None,
    })
}

/// One blocking phase: model call, JSON extraction, field defaulting.
async fn run_phase(
    backend: &dyn ModelBackend,
    spec: &PhaseSpec,
    context: &[ChatMessage],
) -> Result<PhaseOutput, AppError> {
    let raw = backend.complete(spec, context).await?;
    tracing::info!(phase = %spec.phase, raw = %truncate(&raw, RAW_LOG_LIMIT), "phase output");
    let value = extract_json(&raw)?;
    Ok(PhaseOutput::from_value(spec.phase, &value))
}

/// Run the pipeline in streaming mode, pushing tagged progress events into
/// `tx`. On failure a single terminal error event is emitted; phases already
/// emitted remain valid to the consumer.
pub async fn run_chat_stream(
    registry: &PhaseRegistry,
    backend: &dyn ModelBackend,
    messages: Vec<ChatMessage>,
    tx: mpsc::Sender<PipelineEvent>,
) {
    let request_id = Uuid::new_v4();
    if let Err(err) = stream_phases(registry, backend, messages, &tx).await {
        tracing::error!(%request_id, error = %err, kind = err.kind(), "chat stream failed");
        let _ = tx
            .send(PipelineEvent::Error {
                message: err.to_string(),
            })
            .await;
    }
}

async fn stream_phases(
    registry: &PhaseRegistry,
    backend: &dyn ModelBackend,
    messages: Vec<ChatMessage>,
    tx: &mpsc::Sender<PipelineEvent>,
) -> Result<(), AppError> {
    let mut context = messages;
    if let Some(note) = processed_note(&context) {
        context.push(note);
    }

    for &phase in Phase::ALL {
        emit(tx, PipelineEvent::PhaseStart { phase }).await?;

        let output = stream_phase(backend, registry.spec(phase), &context, tx).await?;
        emit(
            tx,
            PipelineEvent::PhaseDone {
                phase,
                output: output.clone(),
            },
        )
        .await?;

        // Grow the context with exactly one synthetic turn per phase.
        match output {
            PhaseOutput::Plan { plan, .. } => context.push(plan_turn(&plan)),
            PhaseOutput::Diagram { diagram_mermaid } => {
                context.push(diagram_turn(&diagram_mermaid))
            }
            PhaseOutput::Code { .. } => {}
        }
    }

    emit(tx, PipelineEvent::AllDone).await
}

/// One streaming phase: forward every provider event in arrival order while
/// accumulating output-text deltas, then extract the phase JSON.
async fn stream_phase(
    backend: &dyn ModelBackend,
    spec: &PhaseSpec,
    context: &[ChatMessage],
    tx: &mpsc::Sender<PipelineEvent>,
) -> Result<PhaseOutput, AppError> {
    let mut rx = backend.stream(spec, context).await?;
    let mut buffer = String::new();

    while let Some(item) = rx.recv().await {
        let event = item?;
        if event.event_type == OUTPUT_TEXT_DELTA {
            if let Some(ref delta) = event.delta {
                buffer.push_str(delta);
            }
        }
        emit(
            tx,
            PipelineEvent::Delta {
                phase: spec.phase,
                event_type: event.event_type,
                delta: event.delta,
            },
        )
        .await?;
    }

    tracing::info!(phase = %spec.phase, raw = %truncate(&buffer, RAW_LOG_LIMIT), "phase output");
    let value = extract_json(&buffer)?;
    Ok(PhaseOutput::from_value(spec.phase, &value))
}

async fn emit(tx: &mpsc::Sender<PipelineEvent>, event: PipelineEvent) -> Result<(), AppError> {
    tx.send(event)
        .await
        .map_err(|_| AppError::Internal("stream receiver dropped".into()))
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
