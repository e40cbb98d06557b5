//! Engine error types.
//!
//! Two tiers, matching the failure taxonomy: build-time errors from
//! `WorkflowNodeFactory` / `WorkflowGraph::compile` (fail fast, never at run
//! time), and run-level errors from `CompiledWorkflow::invoke` (structural
//! failures only — recoverable node failures become context updates instead).

use thiserror::Error;

/// Error when building a workflow (unknown node type, bad config, bad edges).
///
/// Returned by `WorkflowNodeFactory::create_node` and `WorkflowGraph::compile`.
/// Validation ensures every node config passes `validate_config()` and every
/// edge references a registered node before anything executes.
#[derive(Debug, Error)]
pub enum WorkflowBuildError {
    /// The factory has no constructor registered for this node type tag.
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    /// `validate_config()` returned one or more errors for this node.
    #[error("invalid config for node '{node_id}': {}", errors.join("; "))]
    InvalidConfig {
        node_id: String,
        errors: Vec<String>,
    },

    /// A node config value could not be deserialized at all.
    #[error("malformed config for node '{node_id}': {detail}")]
    MalformedConfig { node_id: String, detail: String },

    /// An edge references a node id that was never added.
    #[error("edge references unknown node: {0}")]
    NodeNotFound(String),

    /// A node with this id was added twice.
    #[error("duplicate node id: {0}")]
    DuplicateNodeId(String),

    /// The graph has no nodes to execute.
    #[error("workflow has no executable nodes")]
    NoExecutableNodes,
}

/// Run-level execution error.
///
/// Returned by `CompiledWorkflow::invoke` and the collaborator traits
/// (`LlmClient`, `Retriever`, `Tool`). Nodes swallow recoverable collaborator
/// failures and encode them into the context; only structural failures
/// propagate out of a run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A model invocation failed (network, provider, parse).
    #[error("model invocation failed: {0}")]
    ModelFailed(String),

    /// A retriever invocation failed.
    #[error("retrieval failed: {0}")]
    RetrievalFailed(String),

    /// A tool call failed inside the tool itself.
    #[error("tool '{tool}' failed: {detail}")]
    ToolFailed { tool: String, detail: String },

    /// Execution failed for a structural reason (e.g. empty workflow).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}
