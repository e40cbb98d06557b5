//! Workflow nodes: the ten built-in step types and the trait they share.
//!
//! A node is a pure-ish function from execution context to a partial update:
//! `execute` reads the context and returns a `ContextUpdate` the orchestrator
//! merges. Configuration is validated once at graph-build time via the
//! factory; recoverable failures at execute time become context updates,
//! never errors.

pub mod condition;
mod conditional;
mod delay;
mod error_handler;
mod factory;
mod loop_node;
mod memory;
mod retrieval;
mod start_end;
mod tools;
mod variable;

pub use conditional::{ConditionalConfig, ConditionalNode};
pub use delay::{DelayConfig, DelayNode};
pub use error_handler::{ErrorHandlerConfig, ErrorHandlerNode};
pub use factory::{NodeResources, WorkflowNodeFactory};
pub use loop_node::{LoopConfig, LoopNode};
pub use memory::{MemoryNode, MemoryNodeConfig};
pub use retrieval::{RetrievalConfig, RetrievalNode};
pub use start_end::{EndNode, StartNode};
pub use tools::ToolsNode;
pub use variable::{VariableConfig, VariableNode};

use async_trait::async_trait;

use crate::context::{ContextUpdate, ExecutionContext};
use crate::error::EngineError;

/// One step in a workflow graph.
///
/// Stateless across runs: per-run history (loop counters, tool tracker)
/// lives in the context, not the node. Collaborator handles (LLM, retriever,
/// tools) are injected once at construction.
///
/// **Interaction**: Built by `WorkflowNodeFactory`; executed by
/// `CompiledWorkflow` in resolved order, once per visit.
#[async_trait]
pub trait WorkflowNode: Send + Sync {
    /// Unique id within the graph.
    fn node_id(&self) -> &str;

    /// Type tag (`"start"`, `"memory"`, `"tools"`, ...).
    fn node_type(&self) -> &'static str;

    /// Config errors, if any. Non-empty means the factory refuses the node.
    fn validate_config(&self) -> Vec<String> {
        Vec::new()
    }

    /// Executes one visit. `Err` is reserved for structural failures; tool,
    /// retriever, and model problems are encoded into the returned update.
    async fn execute(&self, ctx: &ExecutionContext) -> Result<ContextUpdate, EngineError>;
}

impl std::fmt::Debug for dyn WorkflowNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowNode")
            .field("node_id", &self.node_id())
            .field("node_type", &self.node_type())
            .finish()
    }
}
