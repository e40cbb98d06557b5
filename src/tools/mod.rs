//! Tool abstraction and lookup.
//!
//! A `Tool` is a named async callable taking structured arguments and
//! returning text. The tool executor looks tools up by name across the
//! registered list (first match wins) and synthesizes an error result when
//! the name is unknown — a missing tool never aborts a run.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::EngineError;

/// A callable tool the model can request by name.
///
/// **Interaction**: Registered on `ToolsNode` / `PipelineRunner`; invoked by
/// `ToolExecutor::execute_calls` under a per-call timeout. Errors are caught
/// there and recorded as failed executions, never propagated past the node.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    async fn call(&self, arguments: Value) -> Result<String, EngineError>;
}

/// Finds the first registered tool with the given name.
pub fn find_tool<'a>(tools: &'a [Arc<dyn Tool>], name: &str) -> Option<&'a Arc<dyn Tool>> {
    tools.iter().find(|t| t.name() == name)
}

type ToolFuture = Pin<Box<dyn Future<Output = Result<String, EngineError>> + Send>>;

/// Tool built from a closure; convenient for tests and simple sync logic.
///
/// The closure returns a boxed future so both sync and async bodies fit:
/// wrap sync results with `Box::pin(async move { ... })`.
pub struct FnTool {
    name: String,
    description: String,
    func: Box<dyn Fn(Value) -> ToolFuture + Send + Sync>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> ToolFuture + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            func: Box::new(func),
        }
    }

    /// Wraps a plain sync function as a tool.
    pub fn from_sync<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Result<String, EngineError> + Send + Sync + Clone + 'static,
    {
        Self::new(name, move |args| {
            let f = func.clone();
            Box::pin(async move { f(args) })
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, arguments: Value) -> Result<String, EngineError> {
        (self.func)(arguments).await
    }
}
