//! # ConvoGraph
//!
//! A workflow engine for conversational AI: compose typed nodes into a graph,
//! run a shared execution context through them, and let the engine handle
//! memory compaction, retrieval injection, tool execution, and failure
//! recovery.
//!
//! ## Design Principles
//!
//! - **Context-in, delta-out**: every node reads an [`ExecutionContext`] and
//!   returns a [`ContextUpdate`]; the orchestrator merges deltas, so nodes
//!   never race on shared state.
//! - **Fail into the context**: recoverable failures (a tool erroring, a
//!   retriever timing out, a summary model being away) are encoded into the
//!   context where later nodes can react; `Err` is reserved for structural
//!   problems.
//! - **Validate at build time**: node configs are checked by the factory and
//!   edge wiring by `compile()`, so a workflow that builds is a workflow that
//!   runs.
//!
//! ## Main Modules
//!
//! - [`workflow`]: `WorkflowGraph`, `CompiledWorkflow`, and the
//!   `PipelineRunner` convenience pipeline.
//! - [`node`]: the ten built-in node types and `WorkflowNodeFactory`.
//! - [`executor`]: bounded tool execution with recursion detection.
//! - [`memory`]: adaptive history compaction with cached summaries.
//! - [`llm`] / [`retrieval`] / [`tools`]: collaborator traits plus mocks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use convograph::{ExecutionContext, Message, MockLlm, PipelineRunner};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let llm = Arc::new(MockLlm::fixed("hello!"));
//! let runner = PipelineRunner::new(llm);
//! let ctx = ExecutionContext::new(vec![Message::human("hi")], "user-1", "conv-1");
//! let out = runner.run(ctx).await.unwrap();
//! println!("{}", out.last_message().unwrap().content());
//! # }
//! ```

pub mod context;
pub mod error;
pub mod executor;
pub mod llm;
pub mod memory;
pub mod message;
pub mod node;
pub mod retrieval;
pub mod stream;
pub mod tools;
pub mod workflow;

pub use context::{ContextUpdate, ExecutionContext, ExecutionRecord, META_SHOULD_STOP};
pub use error::{EngineError, WorkflowBuildError};
pub use executor::{
    RecursionStrategy, StopReason, ToolExecution, ToolExecutionTracker, ToolExecutor,
    ToolExecutorConfig, META_TOOL_STOP,
};
pub use llm::{FinishReason, LlmClient, LlmResponse, MockLlm};
pub use memory::{
    FallbackStrategy, MemoryConfig, MemoryManager, SummaryCache, SummaryStrategy,
    META_MEMORY_CACHE_HIT, META_MEMORY_FALLBACK, META_MEMORY_WINDOW,
};
pub use message::{Message, ToolCall};
pub use node::{
    ConditionalNode, DelayNode, EndNode, ErrorHandlerNode, LoopNode, MemoryNode, NodeResources,
    RetrievalNode, StartNode, ToolsNode, VariableNode, WorkflowNode, WorkflowNodeFactory,
};
pub use retrieval::{Document, MockRetriever, Retriever};
pub use stream::{StreamMode, WorkflowEvent};
pub use tools::{FnTool, Tool};
pub use workflow::{
    route_after_model, CompiledWorkflow, ModelRoute, PipelineOptions, PipelineRunner,
    WorkflowGraph,
};
