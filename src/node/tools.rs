//! Tools node: executes the pending tool calls on the latest assistant turn.
//!
//! A thin graph-node wrapper over `executor::ToolExecutor`. No-op unless the
//! last message carries pending tool calls and at least one tool is
//! registered.

use std::sync::Arc;

use async_trait::async_trait;

use super::WorkflowNode;
use crate::context::{ContextUpdate, ExecutionContext};
use crate::error::EngineError;
use crate::executor::{ToolExecutor, ToolExecutorConfig};
use crate::tools::Tool;

pub struct ToolsNode {
    node_id: String,
    executor: ToolExecutor,
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolsNode {
    pub fn new(node_id: impl Into<String>, config: ToolExecutorConfig) -> Self {
        Self {
            node_id: node_id.into(),
            executor: ToolExecutor::new(config),
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }
}

#[async_trait]
impl WorkflowNode for ToolsNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn node_type(&self) -> &'static str {
        "tools"
    }

    fn validate_config(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let config = self.executor.config();
        if config.max_total_calls == 0 {
            errors.push("max_total_calls must be at least 1".to_string());
        }
        if config.progress_window == 0 {
            errors.push("progress_window must be at least 1".to_string());
        }
        errors
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<ContextUpdate, EngineError> {
        let calls = ctx
            .last_message()
            .map(|m| m.pending_tool_calls().to_vec())
            .unwrap_or_default();
        if calls.is_empty() || self.tools.is_empty() {
            return Ok(ContextUpdate::none());
        }
        Ok(self.executor.execute_calls(ctx, &calls, &self.tools).await)
    }
}
