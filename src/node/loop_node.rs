//! Loop node: bounded iteration with an optional continue condition.
//!
//! Tracks `loop_state[node_id]`; continues while the count is under
//! `max_iterations` and the condition (when set) evaluates true. The counter
//! only increments when the loop continues, so it saturates at the cap.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{condition, WorkflowNode};
use crate::context::{ContextUpdate, ExecutionContext};
use crate::error::EngineError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub max_iterations: u32,
    /// Optional continue condition (same DSL as the Conditional node).
    pub condition: Option<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            condition: None,
        }
    }
}

/// Writes `metadata["loop_<id>_continue"]` (bool) and bumps the iteration
/// counter while continuing.
pub struct LoopNode {
    node_id: String,
    config: LoopConfig,
}

impl LoopNode {
    pub fn new(node_id: impl Into<String>, config: LoopConfig) -> Self {
        Self {
            node_id: node_id.into(),
            config,
        }
    }

    /// Metadata key carrying this node's continue flag.
    pub fn continue_key(node_id: &str) -> String {
        format!("loop_{node_id}_continue")
    }
}

#[async_trait]
impl WorkflowNode for LoopNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn node_type(&self) -> &'static str {
        "loop"
    }

    fn validate_config(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.config.max_iterations == 0 {
            errors.push("max_iterations must be at least 1".to_string());
        }
        if let Some(cond) = &self.config.condition {
            if cond.trim().is_empty() {
                errors.push("condition, when set, must be non-empty".to_string());
            }
        }
        errors
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<ContextUpdate, EngineError> {
        let count = ctx.loop_state.get(&self.node_id).copied().unwrap_or(0);
        let mut update = ContextUpdate::none();

        let mut proceed = count < self.config.max_iterations;
        if proceed {
            if let Some(cond) = &self.config.condition {
                match condition::evaluate(cond, ctx) {
                    Ok(result) => proceed = result,
                    Err(detail) => {
                        proceed = false;
                        update
                            .error_state
                            .insert(format!("{}_error", self.node_id), detail);
                    }
                }
            }
        }

        if proceed {
            update.loop_state.insert(self.node_id.clone(), count + 1);
        }
        update.metadata.insert(
            Self::continue_key(&self.node_id),
            Value::Bool(proceed),
        );
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn step(node: &LoopNode, ctx: &mut ExecutionContext) -> (u32, bool) {
        let update = node.execute(ctx).await.unwrap();
        ctx.apply(node.node_id(), "loop", update);
        let count = ctx.loop_state.get("l1").copied().unwrap_or(0);
        let cont = ctx.metadata[&LoopNode::continue_key("l1")]
            .as_bool()
            .unwrap();
        (count, cont)
    }

    /// **Scenario**: max_iterations=3, no condition, 4 visits — counts are
    /// 1,2,3,3 and continue flags true,true,true,false.
    #[tokio::test]
    async fn saturates_at_max_iterations() {
        let node = LoopNode::new("l1", LoopConfig::default());
        let mut ctx = ExecutionContext::new(vec![], "u1", "c1");
        assert_eq!(step(&node, &mut ctx).await, (1, true));
        assert_eq!(step(&node, &mut ctx).await, (2, true));
        assert_eq!(step(&node, &mut ctx).await, (3, true));
        assert_eq!(step(&node, &mut ctx).await, (3, false));
    }

    /// **Scenario**: a false condition stops the loop before the cap and the
    /// counter does not move.
    #[tokio::test]
    async fn condition_stops_early() {
        let node = LoopNode::new(
            "l1",
            LoopConfig {
                max_iterations: 5,
                condition: Some("tool_calls > 10".into()),
            },
        );
        let mut ctx = ExecutionContext::new(vec![], "u1", "c1");
        assert_eq!(step(&node, &mut ctx).await, (0, false));
    }

    /// **Scenario**: a condition error records error_state and stops.
    #[tokio::test]
    async fn condition_error_stops_and_records() {
        let node = LoopNode::new(
            "l1",
            LoopConfig {
                max_iterations: 5,
                condition: Some("tool_calls > oops".into()),
            },
        );
        let mut ctx = ExecutionContext::new(vec![], "u1", "c1");
        assert_eq!(step(&node, &mut ctx).await, (0, false));
        assert!(ctx.error_state.contains_key("l1_error"));
    }

    /// **Scenario**: zero max_iterations is a validation error.
    #[test]
    fn zero_max_iterations_invalid() {
        let node = LoopNode::new(
            "l1",
            LoopConfig {
                max_iterations: 0,
                condition: None,
            },
        );
        assert!(!node.validate_config().is_empty());
    }
}
