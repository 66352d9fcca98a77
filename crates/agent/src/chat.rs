//! Chat calls raced against the run's cancellation token.

use clawflow_core::agent::AgentResultStream;
use clawflow_core::message::MessageToolCall;
use clawflow_core::provider::{Provider, ProviderRequest, ToolCallAssembler, ToolChoice};
use clawflow_core::stream::StepEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;

/// The (thinking, content, tool_calls) triple of one chat turn.
#[derive(Debug, Clone, Default)]
pub(crate) struct ChatOutput {
    pub thinking: String,
    pub content: String,
    pub tool_calls: Vec<MessageToolCall>,
}

pub(crate) async fn complete(
    provider: &dyn Provider,
    request: ProviderRequest,
    cancel: &CancellationToken,
) -> Result<ChatOutput, AgentError> {
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AgentError::Cancelled),
        response = provider.complete(request) => response?,
    };
    Ok(ChatOutput {
        thinking: response.thinking,
        content: response.message.content,
        tool_calls: response.message.tool_calls,
    })
}

/// Stream one chat turn into `phase`.
///
/// Every chunk that adds text yields an increment holding the full prefix so
/// far. Tool-call fragments are reassembled by index and only revealed on
/// the final increment. Under [`ToolChoice::None`] nothing will execute, so
/// that increment reveals no calls.
pub(crate) async fn stream(
    provider: &dyn Provider,
    mut request: ProviderRequest,
    cancel: &CancellationToken,
    phase: &mpsc::Sender<StepEvent>,
) -> Result<ChatOutput, AgentError> {
    request.stream = true;
    let may_act = request.tool_choice != ToolChoice::None;
    let mut chunks = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AgentError::Cancelled),
        chunks = provider.stream(request) => chunks?,
    };

    let mut out = ChatOutput::default();
    let mut assembler = ToolCallAssembler::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            next = chunks.recv() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = chunk?;

        let mut grew = false;
        if let Some(thinking) = chunk.thinking.filter(|t| !t.is_empty()) {
            out.thinking.push_str(&thinking);
            grew = true;
        }
        if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
            out.content.push_str(&content);
            grew = true;
        }
        for delta in &chunk.tool_call_deltas {
            assembler.push(delta);
        }
        if grew {
            let _ = phase
                .send(StepEvent::Increment(AgentResultStream {
                    reasoning: out.thinking.clone(),
                    content: out.content.clone(),
                    tool_calls: None,
                }))
                .await;
        }
        if chunk.done {
            break;
        }
    }

    out.tool_calls = assembler.finish();
    let revealed = if may_act {
        out.tool_calls.clone()
    } else {
        Vec::new()
    };
    let _ = phase
        .send(StepEvent::Increment(AgentResultStream {
            reasoning: out.thinking.clone(),
            content: out.content.clone(),
            tool_calls: Some(revealed),
        }))
        .await;
    Ok(out)
}
