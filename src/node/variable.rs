//! Variable node: set / get / append / increment / decrement on the
//! context's variable store.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::WorkflowNode;
use crate::context::{ContextUpdate, ExecutionContext};
use crate::error::EngineError;

const OPERATIONS: [&str; 5] = ["set", "get", "append", "increment", "decrement"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VariableConfig {
    /// Target variable. When omitted, `var_<node_id>` is derived (logged as
    /// a warning — a documented convenience, not a silent default).
    pub variable_name: Option<String>,
    pub operation: String,
    /// Operand for set/append; ignored by the other operations.
    pub value: Option<Value>,
}

impl Default for VariableConfig {
    fn default() -> Self {
        Self {
            variable_name: None,
            operation: "set".to_string(),
            value: None,
        }
    }
}

/// Manipulates one variable per visit.
///
/// - `set`: store the configured value.
/// - `get`: ensure the key exists (null when absent); otherwise a no-op.
/// - `append`: scalars become a two-element list on first append.
/// - `increment`/`decrement`: non-numeric existing values count as 0.
pub struct VariableNode {
    node_id: String,
    config: VariableConfig,
}

impl VariableNode {
    pub fn new(node_id: impl Into<String>, config: VariableConfig) -> Self {
        Self {
            node_id: node_id.into(),
            config,
        }
    }

    fn variable_name(&self) -> String {
        match &self.config.variable_name {
            Some(name) => name.clone(),
            None => format!("var_{}", self.node_id),
        }
    }
}

#[async_trait]
impl WorkflowNode for VariableNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn node_type(&self) -> &'static str {
        "variable"
    }

    fn validate_config(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(name) = &self.config.variable_name {
            if name.trim().is_empty() {
                errors.push("variable_name must be non-empty".to_string());
            }
        } else {
            warn!(
                node_id = %self.node_id,
                derived = %self.variable_name(),
                "variable_name omitted, deriving from node id"
            );
        }
        if !OPERATIONS.contains(&self.config.operation.as_str()) {
            errors.push(format!(
                "operation must be one of {OPERATIONS:?}, got '{}'",
                self.config.operation
            ));
        }
        errors
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<ContextUpdate, EngineError> {
        let name = self.variable_name();
        let existing = ctx.variables.get(&name);
        let mut update = ContextUpdate::none();

        let new_value = match self.config.operation.as_str() {
            "set" => Some(self.config.value.clone().unwrap_or(Value::Null)),
            "get" => {
                // Only materializes a missing key.
                if existing.is_none() {
                    Some(Value::Null)
                } else {
                    None
                }
            }
            "append" => {
                let appended = self.config.value.clone().unwrap_or(Value::Null);
                Some(match existing {
                    Some(Value::Array(items)) => {
                        let mut items = items.clone();
                        items.push(appended);
                        Value::Array(items)
                    }
                    Some(scalar) => Value::Array(vec![scalar.clone(), appended]),
                    None => Value::Array(vec![appended]),
                })
            }
            "increment" | "decrement" => {
                let current = existing.and_then(Value::as_i64).unwrap_or(0);
                let delta = if self.config.operation == "increment" {
                    1
                } else {
                    -1
                };
                Some(Value::Number((current + delta).into()))
            }
            // Unreachable past validation; keep the run alive regardless.
            other => {
                update.error_state.insert(
                    format!("{}_error", self.node_id),
                    format!("unknown variable operation '{other}'"),
                );
                None
            }
        };

        if let Some(v) = new_value {
            update.variables.insert(name, v);
        }
        Ok(update)
    }
}
