//! Start and End nodes: run boundary markers.
//!
//! Start stamps `start_time` into metadata; End stamps `end_time` and, when a
//! start marker exists, the derived `execution_time_ms`. Neither touches the
//! conversation.

use async_trait::async_trait;
use serde_json::Value;

use super::WorkflowNode;
use crate::context::{now_ms, ContextUpdate, ExecutionContext};
use crate::error::EngineError;

pub const META_START_TIME: &str = "start_time";
pub const META_END_TIME: &str = "end_time";
pub const META_EXECUTION_TIME_MS: &str = "execution_time_ms";

pub struct StartNode {
    node_id: String,
}

impl StartNode {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
        }
    }
}

#[async_trait]
impl WorkflowNode for StartNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn node_type(&self) -> &'static str {
        "start"
    }

    async fn execute(&self, _ctx: &ExecutionContext) -> Result<ContextUpdate, EngineError> {
        Ok(ContextUpdate::none()
            .with_metadata(META_START_TIME, Value::Number(now_ms().into())))
    }
}

pub struct EndNode {
    node_id: String,
}

impl EndNode {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
        }
    }
}

#[async_trait]
impl WorkflowNode for EndNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn node_type(&self) -> &'static str {
        "end"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<ContextUpdate, EngineError> {
        let end = now_ms();
        let mut update =
            ContextUpdate::none().with_metadata(META_END_TIME, Value::Number(end.into()));
        if let Some(start) = ctx.metadata.get(META_START_TIME).and_then(Value::as_u64) {
            update.metadata.insert(
                META_EXECUTION_TIME_MS.to_string(),
                Value::Number(end.saturating_sub(start).into()),
            );
        }
        Ok(update)
    }
}
