//! Error handler node: retry bookkeeping and fallback actions.
//!
//! Looks for any `*_error` key in `error_state`. While retries remain it
//! bumps `retries_<node_id>` (signaling "retry" in metadata); once exhausted
//! it either wipes the error state or stops the workflow, per
//! `fallback_action`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::WorkflowNode;
use crate::context::{ContextUpdate, ExecutionContext};
use crate::error::EngineError;

const FALLBACK_ACTIONS: [&str; 2] = ["clear_errors", "stop"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ErrorHandlerConfig {
    pub retry_count: u32,
    /// `clear_errors` wipes error_state; `stop` halts the workflow.
    pub fallback_action: String,
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            fallback_action: "clear_errors".to_string(),
        }
    }
}

pub struct ErrorHandlerNode {
    node_id: String,
    config: ErrorHandlerConfig,
}

impl ErrorHandlerNode {
    pub fn new(node_id: impl Into<String>, config: ErrorHandlerConfig) -> Self {
        Self {
            node_id: node_id.into(),
            config,
        }
    }

    fn action_key(&self) -> String {
        format!("error_handler_{}", self.node_id)
    }
}

#[async_trait]
impl WorkflowNode for ErrorHandlerNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn node_type(&self) -> &'static str {
        "error_handler"
    }

    fn validate_config(&self) -> Vec<String> {
        if FALLBACK_ACTIONS.contains(&self.config.fallback_action.as_str()) {
            Vec::new()
        } else {
            vec![format!(
                "fallback_action must be one of {FALLBACK_ACTIONS:?}, got '{}'",
                self.config.fallback_action
            )]
        }
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<ContextUpdate, EngineError> {
        let has_errors = ctx.error_state.keys().any(|k| k.ends_with("_error"));
        if !has_errors {
            return Ok(ContextUpdate::none());
        }

        let retries = ctx.retry_count(&self.node_id);
        let mut update = ContextUpdate::none();

        if retries < self.config.retry_count {
            debug!(
                node_id = %self.node_id,
                retry = retries + 1,
                of = self.config.retry_count,
                "errors present, signaling retry"
            );
            update.error_state.insert(
                format!("retries_{}", self.node_id),
                (retries + 1).to_string(),
            );
            update
                .metadata
                .insert(self.action_key(), Value::String("retry".into()));
        } else {
            match self.config.fallback_action.as_str() {
                "stop" => {
                    update.should_stop = true;
                    update
                        .metadata
                        .insert(self.action_key(), Value::String("stop".into()));
                }
                // "clear_errors" (validated); the retry counter lives in
                // error_state, so it is wiped along with the errors.
                _ => {
                    update.clear_error_state = true;
                    update
                        .metadata
                        .insert(self.action_key(), Value::String("clear_errors".into()));
                }
            }
        }
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn erroring_ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new(vec![], "u1", "c1");
        ctx.error_state
            .insert("tool_error".into(), "boom".into());
        ctx
    }

    /// **Scenario**: bad fallback_action fails validation.
    #[test]
    fn validation_checks_fallback_action() {
        let node = ErrorHandlerNode::new(
            "e1",
            ErrorHandlerConfig {
                retry_count: 1,
                fallback_action: "explode".into(),
            },
        );
        assert!(!node.validate_config().is_empty());
    }

    /// **Scenario**: no errors present — no-op.
    #[tokio::test]
    async fn no_errors_no_op() {
        let node = ErrorHandlerNode::new("e1", ErrorHandlerConfig::default());
        let ctx = ExecutionContext::new(vec![], "u1", "c1");
        let update = node.execute(&ctx).await.unwrap();
        assert!(update.error_state.is_empty());
        assert!(!update.clear_error_state);
        assert!(!update.should_stop);
    }

    /// **Scenario**: retries increment until the budget is spent, then
    /// clear_errors wipes error_state (including the retry counter).
    #[tokio::test]
    async fn retries_then_clear() {
        let node = ErrorHandlerNode::new(
            "e1",
            ErrorHandlerConfig {
                retry_count: 2,
                fallback_action: "clear_errors".into(),
            },
        );
        let mut ctx = erroring_ctx();
        for expected in 1..=2u32 {
            let update = node.execute(&ctx).await.unwrap();
            ctx.apply("e1", "error_handler", update);
            assert_eq!(ctx.retry_count("e1"), expected);
        }
        let update = node.execute(&ctx).await.unwrap();
        ctx.apply("e1", "error_handler", update);
        assert!(ctx.error_state.is_empty(), "errors and counters wiped");
        assert!(!ctx.should_stop());
    }

    /// **Scenario**: exhausted retries with fallback "stop" halt the workflow.
    #[tokio::test]
    async fn exhausted_retries_stop() {
        let node = ErrorHandlerNode::new(
            "e1",
            ErrorHandlerConfig {
                retry_count: 0,
                fallback_action: "stop".into(),
            },
        );
        let mut ctx = erroring_ctx();
        let update = node.execute(&ctx).await.unwrap();
        ctx.apply("e1", "error_handler", update);
        assert!(ctx.should_stop());
    }
}
