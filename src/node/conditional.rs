//! Conditional node: evaluates one DSL condition and records the result.

use async_trait::async_trait;
use serde::Deserialize;

use super::{condition, WorkflowNode};
use crate::context::{ContextUpdate, ExecutionContext};
use crate::error::EngineError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConditionalConfig {
    /// Condition DSL string; required, checked at build time.
    pub condition: String,
}

/// Evaluates its condition on each visit and stores the boolean under
/// `conditional_results[node_id]`. An evaluation failure stores `false` and
/// records the error under `error_state["<node_id>_error"]`.
pub struct ConditionalNode {
    node_id: String,
    config: ConditionalConfig,
}

impl ConditionalNode {
    pub fn new(node_id: impl Into<String>, config: ConditionalConfig) -> Self {
        Self {
            node_id: node_id.into(),
            config,
        }
    }
}

#[async_trait]
impl WorkflowNode for ConditionalNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn node_type(&self) -> &'static str {
        "conditional"
    }

    fn validate_config(&self) -> Vec<String> {
        if self.config.condition.trim().is_empty() {
            vec!["condition must be a non-empty string".to_string()]
        } else {
            Vec::new()
        }
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<ContextUpdate, EngineError> {
        let mut update = ContextUpdate::none();
        match condition::evaluate(&self.config.condition, ctx) {
            Ok(result) => {
                update.conditional_results.insert(self.node_id.clone(), result);
            }
            Err(detail) => {
                update.conditional_results.insert(self.node_id.clone(), false);
                update
                    .error_state
                    .insert(format!("{}_error", self.node_id), detail);
            }
        }
        Ok(update)
    }
}
