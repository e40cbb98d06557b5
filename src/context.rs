//! Execution context threaded through every node call, and the delta type
//! nodes return.
//!
//! One `ExecutionContext` per workflow run. Nodes never mutate it directly:
//! `execute()` returns a `ContextUpdate` and the orchestrator merges it via
//! `ExecutionContext::apply`, which also appends an `ExecutionRecord` to the
//! trace log. Fields are only extended or replaced wholesale, never removed.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::executor::ToolExecutionTracker;
use crate::message::Message;

/// Metadata key the orchestrator checks after each node to stop the run early.
pub const META_SHOULD_STOP: &str = "workflow_should_stop";

/// One entry in the execution trace: which node ran, when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub node_id: String,
    pub node_type: String,
    pub timestamp_ms: u64,
}

/// Mutable-by-replacement state for one workflow run.
///
/// **Interaction**: Created by the caller (or `PipelineRunner`) with the
/// initial message list and ids; threaded through `WorkflowNode::execute`;
/// returned as the run result by `CompiledWorkflow::invoke`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Ordered conversation turns. Append-only within a turn; the memory
    /// layer may replace the whole list with a pruned + summarized version.
    pub messages: Vec<Message>,
    /// Opaque caller id; immutable for the life of the context.
    pub user_id: String,
    /// Opaque conversation id; immutable for the life of the context.
    pub conversation_id: String,
    /// Set by a Retrieval node, consumed by the model step.
    pub retrieval_context: Option<String>,
    /// Produced by the memory layer in place of pruned history.
    pub conversation_summary: Option<String>,
    /// Running tool-call total; monotonically non-decreasing within a run.
    pub tool_call_count: u32,
    /// Open key/value bag for cross-node signaling. Keys are node-local
    /// namespaces (e.g. `delay_<node_id>`) to avoid collision.
    pub metadata: Map<String, Value>,
    /// User-defined variables manipulated by Variable nodes.
    pub variables: Map<String, Value>,
    /// Loop-node iteration counts, keyed by node id.
    pub loop_state: HashMap<String, u32>,
    /// Node-scoped error descriptions (`<node>_error`) and retry counters
    /// (`retries_<node>`, stored as stringified integers).
    pub error_state: HashMap<String, String>,
    /// Last boolean evaluation per conditional node id.
    pub conditional_results: HashMap<String, bool>,
    /// Append-only trace of node executions.
    pub execution_history: Vec<ExecutionRecord>,
    /// Per-run tool execution tracker; created lazily by the tool executor
    /// and never shared across runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_tracker: Option<ToolExecutionTracker>,
}

impl ExecutionContext {
    /// Creates a context for one run with the initial conversation.
    pub fn new(
        messages: Vec<Message>,
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            messages,
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            ..Self::default()
        }
    }

    /// Last turn in the conversation, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Last human turn, searched from the end.
    pub fn last_human_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_human())
    }

    /// True when the last turn is an assistant message with unresolved tool calls.
    pub fn has_pending_tool_calls(&self) -> bool {
        self.last_message()
            .map(|m| !m.pending_tool_calls().is_empty())
            .unwrap_or(false)
    }

    /// True when a node has requested the run to stop via metadata.
    pub fn should_stop(&self) -> bool {
        self.metadata
            .get(META_SHOULD_STOP)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Merges a node's delta into the context and records the execution.
    ///
    /// Merge rules: `messages` replacement wins over appends from the same
    /// update (a node does one or the other); maps are inserted key-by-key;
    /// counters only ever grow.
    pub fn apply(&mut self, node_id: &str, node_type: &str, update: ContextUpdate) {
        if let Some(messages) = update.messages {
            self.messages = messages;
        }
        self.messages.extend(update.append_messages);
        if let Some(rc) = update.retrieval_context {
            self.retrieval_context = Some(rc);
        }
        if let Some(summary) = update.conversation_summary {
            self.conversation_summary = Some(summary);
        }
        self.tool_call_count += update.tool_calls_delta;
        for (k, v) in update.metadata {
            self.metadata.insert(k, v);
        }
        for (k, v) in update.variables {
            self.variables.insert(k, v);
        }
        for (k, v) in update.loop_state {
            self.loop_state.insert(k, v);
        }
        if update.clear_error_state {
            self.error_state.clear();
        }
        for (k, v) in update.error_state {
            self.error_state.insert(k, v);
        }
        for (k, v) in update.conditional_results {
            self.conditional_results.insert(k, v);
        }
        if let Some(tracker) = update.tool_tracker {
            self.tool_tracker = Some(tracker);
        }
        if update.should_stop {
            self.metadata
                .insert(META_SHOULD_STOP.to_string(), Value::Bool(true));
        }
        self.execution_history.push(ExecutionRecord {
            node_id: node_id.to_string(),
            node_type: node_type.to_string(),
            timestamp_ms: now_ms(),
        });
    }

    /// Retry counter for a node, parsed from `error_state["retries_<id>"]`.
    pub fn retry_count(&self, node_id: &str) -> u32 {
        self.error_state
            .get(&format!("retries_{node_id}"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

/// Partial context update returned by one node execution.
///
/// Every field defaults to "no change"; the orchestrator merges via
/// `ExecutionContext::apply`. Nodes build exactly the delta they mean and
/// leave the rest alone.
#[derive(Debug, Clone, Default)]
pub struct ContextUpdate {
    /// Wholesale replacement of the message list (memory compaction).
    pub messages: Option<Vec<Message>>,
    /// Turns appended after any replacement.
    pub append_messages: Vec<Message>,
    pub retrieval_context: Option<String>,
    pub conversation_summary: Option<String>,
    /// Added to the running tool-call total.
    pub tool_calls_delta: u32,
    pub metadata: Map<String, Value>,
    pub variables: Map<String, Value>,
    pub loop_state: HashMap<String, u32>,
    /// Wipes `error_state` before `error_state` inserts are applied.
    pub clear_error_state: bool,
    pub error_state: HashMap<String, String>,
    pub conditional_results: HashMap<String, bool>,
    pub tool_tracker: Option<ToolExecutionTracker>,
    /// Sets `metadata["workflow_should_stop"] = true` on apply.
    pub should_stop: bool,
}

impl ContextUpdate {
    /// An update that changes nothing (still recorded in the trace).
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_error(mut self, key: impl Into<String>, detail: impl Into<String>) -> Self {
        self.error_state.insert(key.into(), detail.into());
        self
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
