//! Chat model abstraction.
//!
//! The engine never talks to a provider directly: nodes and the pipeline
//! runner hold a `dyn LlmClient` and work with `LlmResponse` — assistant
//! text, structured tool-call requests, and a finish reason. The finish
//! reason is authoritative for routing (see `workflow::runner`).

mod mock;

pub use mock::MockLlm;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::message::{Message, ToolCall};

/// Why the model stopped: done, wants tools, or something provider-specific.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Model considers the turn complete.
    Stop,
    /// Model expects the requested tool calls to be executed.
    ToolCalls,
    /// Provider-specific reason (length, content filter, ...).
    Other(String),
}

impl FinishReason {
    /// Parses a provider finish-reason string; unknown values map to `Other`.
    pub fn parse(s: &str) -> Self {
        match s {
            "stop" => Self::Stop,
            "tool_calls" => Self::ToolCalls,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// One model completion: assistant text, requested tool calls, finish reason.
///
/// **Interaction**: Returned by `LlmClient::invoke`; the pipeline runner
/// appends `content` as an assistant message (with `tool_calls` attached when
/// pending) and routes on `finish_reason`.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
}

impl LlmResponse {
    /// A plain completed text response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
        }
    }

    /// A response requesting tool execution.
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            finish_reason: FinishReason::ToolCalls,
        }
    }
}

/// Chat model client: given the message history, produce one completion.
///
/// Implementations: `MockLlm` (scripted, for tests and examples); real
/// providers live outside this crate and only need this trait.
///
/// **Interaction**: Held by `MemoryNode`/`MemoryManager` (summarization) and
/// the pipeline runner (conversation turns).
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Invoke one turn: read messages, return content, tool calls, finish reason.
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, EngineError>;
}
