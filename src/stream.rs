//! Streaming types for workflow runs.
//!
//! Defines stream modes and events for value and update streaming. Used by
//! `CompiledWorkflow::stream` to report progress while nodes execute.

use crate::context::{ContextUpdate, ExecutionContext};

/// Stream mode selector: which kinds of events to emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamMode {
    /// Emit the full context after each node completes.
    Values,
    /// Emit the per-node delta with the node id that produced it.
    Updates,
}

/// Streamed event emitted while running a workflow.
#[derive(Clone, Debug)]
pub enum WorkflowEvent {
    /// A node is about to execute.
    NodeStarted { node_id: String, node_type: String },
    /// Full context snapshot after a node finishes.
    Values(Box<ExecutionContext>),
    /// Delta a node produced, before it was merged.
    Updates {
        node_id: String,
        update: ContextUpdate,
    },
    /// The run finished; carries the final merged context.
    Finished(Box<ExecutionContext>),
}
