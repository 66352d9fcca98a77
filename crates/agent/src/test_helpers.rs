//! Scripted providers for agent and flow tests.

use std::sync::Mutex;

use clawflow_core::error::ProviderError;
use clawflow_core::message::{Message, MessageToolCall};
use clawflow_core::provider::{
    Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolCallDelta, Usage,
};
use tokio::sync::mpsc;

/// A mock provider that returns a sequence of scripted results.
///
/// Each call to `complete` or `stream` takes the next result. Once the script
/// runs out it repeats the fallback response if one was given, and panics
/// otherwise. Every request is recorded for later inspection.
pub struct SequentialMockProvider {
    script: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    fallback: Option<ProviderResponse>,
    call_count: Mutex<usize>,
    requests: Mutex<Vec<ProviderRequest>>,
    chunked: bool,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::from_results(responses.into_iter().map(Ok).collect())
    }

    pub fn from_results(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script),
            fallback: None,
            call_count: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
            chunked: false,
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// Create a provider that first returns tool calls, then a final answer.
    pub fn tool_then_answer(tool_calls: Vec<MessageToolCall>, thought: &str, answer: &str) -> Self {
        Self::new(vec![
            make_tool_call_response(tool_calls, thought),
            make_text_response(answer),
        ])
    }

    /// A provider that answers every call with `response`.
    pub fn repeating(response: ProviderResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::new(vec![])
        }
    }

    /// Stream responses word by word, with tool-call arguments split across
    /// two fragments.
    pub fn chunked(mut self) -> Self {
        self.chunked = true;
        self
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut count = self.call_count.lock().unwrap();
        let script = self.script.lock().unwrap();
        let result = match script.get(*count) {
            Some(result) => result.clone(),
            None => match &self.fallback {
                Some(response) => Ok(response.clone()),
                None => panic!(
                    "SequentialMockProvider: no more responses (call #{}, have {})",
                    *count,
                    script.len()
                ),
            },
        };
        *count += 1;
        result
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.next(request)
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        let response = self.next(request)?;
        let chunks = if self.chunked {
            split_into_chunks(response)
        } else {
            vec![single_chunk(response)]
        };
        let (tx, rx) = mpsc::channel(chunks.len().max(1));
        for chunk in chunks {
            let _ = tx.send(Ok(chunk)).await;
        }
        Ok(rx)
    }
}

fn deltas(calls: &[MessageToolCall]) -> Vec<ToolCallDelta> {
    calls
        .iter()
        .enumerate()
        .map(|(i, call)| ToolCallDelta {
            index: i as u32,
            id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            arguments: call.arguments.clone(),
        })
        .collect()
}

fn single_chunk(response: ProviderResponse) -> StreamChunk {
    StreamChunk {
        thinking: Some(response.thinking),
        content: Some(response.message.content),
        tool_call_deltas: deltas(&response.message.tool_calls),
        done: true,
        usage: response.usage,
    }
}

fn split_into_chunks(response: ProviderResponse) -> Vec<StreamChunk> {
    let mut chunks = Vec::new();
    if !response.thinking.is_empty() {
        chunks.push(StreamChunk {
            thinking: Some(response.thinking.clone()),
            ..Default::default()
        });
    }
    for word in response.message.content.split_inclusive(' ') {
        chunks.push(StreamChunk {
            content: Some(word.to_string()),
            ..Default::default()
        });
    }
    for (i, call) in response.message.tool_calls.iter().enumerate() {
        let mid = call.arguments.len() / 2;
        let mid = (0..=mid)
            .rev()
            .find(|&m| call.arguments.is_char_boundary(m))
            .unwrap_or(0);
        let (head, tail) = call.arguments.split_at(mid);
        chunks.push(StreamChunk {
            tool_call_deltas: vec![ToolCallDelta {
                index: i as u32,
                id: Some(call.id.clone()),
                name: Some(call.name.clone()),
                arguments: head.to_string(),
            }],
            ..Default::default()
        });
        chunks.push(StreamChunk {
            tool_call_deltas: vec![ToolCallDelta {
                index: i as u32,
                arguments: tail.to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
    }
    chunks.push(StreamChunk {
        done: true,
        usage: response.usage,
        ..Default::default()
    });
    chunks
}

/// A provider whose calls never complete. Used to exercise cancellation.
pub struct StalledProvider;

#[async_trait::async_trait]
impl Provider for StalledProvider {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        std::future::pending().await
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        thinking: String::new(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional text content.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tools(thought, tool_calls),
        ..make_text_response(thought)
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawflow_core::provider::ToolCallAssembler;

    #[tokio::test]
    async fn chunked_stream_reassembles() {
        let provider = SequentialMockProvider::new(vec![make_tool_call_response(
            vec![make_tool_call("planning", serde_json::json!({"command": "list"}))],
            "let me check",
        )])
        .chunked();

        let mut rx = provider
            .stream(ProviderRequest::new("m", vec![]))
            .await
            .unwrap();
        let mut content = String::new();
        let mut assembler = ToolCallAssembler::new();
        let mut chunks = 0;
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.unwrap();
            chunks += 1;
            content.push_str(chunk.content.as_deref().unwrap_or(""));
            for d in &chunk.tool_call_deltas {
                assembler.push(d);
            }
        }
        assert!(chunks > 3);
        assert_eq!(content, "let me check");
        let calls = assembler.finish();
        assert_eq!(calls[0].arguments, r#"{"command":"list"}"#);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn repeating_never_runs_out() {
        let provider = SequentialMockProvider::repeating(make_text_response("again"));
        for _ in 0..3 {
            let r = provider.complete(ProviderRequest::new("m", vec![])).await.unwrap();
            assert_eq!(r.message.content, "again");
        }
        assert_eq!(provider.requests().len(), 3);
    }
}
