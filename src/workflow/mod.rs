//! Workflow orchestration: graph building, compiled execution, and the
//! capability-based linear pipeline.

mod compiled;
mod graph;
mod runner;

pub use compiled::CompiledWorkflow;
pub use graph::WorkflowGraph;
pub use runner::{route_after_model, ModelRoute, PipelineOptions, PipelineRunner};
