//! Role-tagged chat turns and tool-call payloads.
//!
//! One `Message` per conversation turn: system, human, assistant, or tool.
//! Assistant turns may carry pending `ToolCall`s; tool turns carry the result
//! of one call, linked back by `call_id`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool invocation requested by the model: name plus structured arguments.
///
/// **Interaction**: Produced by `LlmClient::invoke` in `LlmResponse::tool_calls`;
/// consumed by `ToolExecutor::execute_calls`, which emits one `Message::Tool`
/// per call with the matching `call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id; echoed back in the tool-result message.
    pub id: String,
    /// Tool name to look up in the registered tool list.
    pub name: String,
    /// Structured arguments (already parsed JSON, `{}` when absent).
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One conversation turn, tagged by role.
///
/// **Interaction**: `ExecutionContext::messages` holds these in append order.
/// `MemoryManager` replaces the list wholesale when compacting; `ToolsNode`
/// reads the last turn's `tool_calls` to decide whether any work is pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// System preamble (prompt, instructions).
    System { content: String },
    /// End-user turn.
    Human { content: String },
    /// Model turn; `tool_calls` is non-empty while calls are pending.
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Result of one tool call, linked by `call_id`.
    Tool {
        content: String,
        call_id: String,
        name: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool(
        content: impl Into<String>,
        call_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::Tool {
            content: content.into(),
            call_id: call_id.into(),
            name: name.into(),
        }
    }

    /// Text content of the turn, regardless of role.
    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::Human { content }
            | Self::Assistant { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }

    /// Role tag as a lowercase string (serde representation).
    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::Human { .. } => "human",
            Self::Assistant { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Self::Human { .. })
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant { .. })
    }

    /// Tool calls still pending on this turn; empty for non-assistant turns.
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}
