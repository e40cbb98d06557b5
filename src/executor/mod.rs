//! Tool executor: runs the tool calls requested by the latest model turn,
//! with budgets, per-call timeouts, and recursion detection.
//!
//! Every requested call executes independently — one tool's failure or
//! timeout is recorded and surfaced to the model as a tool-result message,
//! never propagated out of the executor. When a stop check trips, the
//! executor synthesizes a finalization assistant message instead of invoking
//! anything further.

mod tracker;

pub use tracker::{StopReason, ToolExecution, ToolExecutionTracker};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::{ContextUpdate, ExecutionContext};
use crate::message::{Message, ToolCall};
use crate::tools::{find_tool, Tool};

/// Metadata key set when execution was stopped instead of running more tools.
pub const META_TOOL_STOP: &str = "tool_execution_stopped";

/// How aggressively the tracker flags unproductive tool loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecursionStrategy {
    /// Any repeated (tool, args) pair in the window is recursion.
    Strict,
    /// No-progress, ping-pong, and error-loop heuristics.
    #[default]
    Adaptive,
    /// Only a tight failing loop on one tool is flagged.
    Lenient,
}

/// Tool executor configuration. All limits are per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolExecutorConfig {
    /// Hard cap on tool calls across the whole run.
    pub max_total_calls: u32,
    /// Per-tool caps; tools not listed fall back to `max_total_calls`.
    pub max_calls_per_tool: HashMap<String, u32>,
    /// Cap on calling the same tool back-to-back.
    pub max_consecutive_calls: u32,
    /// How many recent executions the recursion heuristics look at.
    pub progress_window: usize,
    pub enable_recursion_detection: bool,
    pub recursion_strategy: RecursionStrategy,
    /// Per-call timeout; a timed-out call is a failed execution, not a crash.
    pub timeout_seconds: u64,
}

impl Default for ToolExecutorConfig {
    fn default() -> Self {
        Self {
            max_total_calls: 10,
            max_calls_per_tool: HashMap::new(),
            max_consecutive_calls: 3,
            progress_window: 5,
            enable_recursion_detection: true,
            recursion_strategy: RecursionStrategy::Adaptive,
            timeout_seconds: 30,
        }
    }
}

/// Executes one model turn's worth of tool calls against the registered tools.
///
/// **Interaction**: Used by `ToolsNode` and `PipelineRunner`. Reads the
/// tracker off the context, records every call into it, and hands it back
/// through the returned `ContextUpdate`.
pub struct ToolExecutor {
    config: ToolExecutorConfig,
}

impl ToolExecutor {
    pub fn new(config: ToolExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolExecutorConfig {
        &self.config
    }

    /// Runs the requested calls in order, stopping early when a budget or
    /// recursion check trips. Returns the delta: one tool-result message per
    /// attempted call (or one finalization assistant message on stop), the
    /// updated tracker, and the call-count increment.
    pub async fn execute_calls(
        &self,
        ctx: &ExecutionContext,
        calls: &[ToolCall],
        tools: &[Arc<dyn Tool>],
    ) -> ContextUpdate {
        let mut tracker = ctx.tool_tracker.clone().unwrap_or_default();
        let mut update = ContextUpdate::none();

        for call in calls {
            if let Some(reason) =
                tracker.check_next_call(&self.config, Some((&call.name, &call.arguments)))
            {
                warn!(tool = %call.name, %reason, "stopping tool execution");
                update.metadata.insert(
                    META_TOOL_STOP.to_string(),
                    Value::String(reason.to_string()),
                );
                update.append_messages.push(Message::assistant(format!(
                    "Stopping tool use: {reason}. Answering with the information gathered so far."
                )));
                break;
            }

            let execution = self.run_one(call, tools).await;
            update.append_messages.push(Message::tool(
                execution.result.clone(),
                call.id.clone(),
                call.name.clone(),
            ));
            update.tool_calls_delta += 1;
            tracker.record(execution);
        }

        update.tool_tracker = Some(tracker);
        update
    }

    /// Executes a single call under the configured timeout. Missing tools,
    /// tool errors, and timeouts all become failed executions whose result
    /// text is what the model sees.
    async fn run_one(&self, call: &ToolCall, tools: &[Arc<dyn Tool>]) -> ToolExecution {
        let started = Instant::now();

        let Some(tool) = find_tool(tools, &call.name) else {
            warn!(tool = %call.name, "requested tool not registered");
            return ToolExecution {
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
                result: format!("Error: tool '{}' is not available", call.name),
                duration_ms: 0,
                success: false,
            };
        };

        debug!(tool = %call.name, args = %call.arguments, "calling tool");
        let outcome = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_seconds),
            tool.call(call.arguments.clone()),
        )
        .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (result, success) = match outcome {
            Ok(Ok(text)) => (text, true),
            Ok(Err(e)) => {
                warn!(tool = %call.name, error = %e, "tool call failed");
                (format!("Error: {e}"), false)
            }
            Err(_) => {
                warn!(
                    tool = %call.name,
                    timeout_s = self.config.timeout_seconds,
                    "tool call timed out"
                );
                (
                    format!(
                        "Error: tool '{}' timed out after {}s",
                        call.name, self.config.timeout_seconds
                    ),
                    false,
                )
            }
        };

        ToolExecution {
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
            duration_ms,
            success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::FnTool;
    use serde_json::json;

    fn tools() -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(FnTool::from_sync("echo", |args| {
                Ok(args
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string())
            })),
            Arc::new(FnTool::from_sync("broken", |_| {
                Err(crate::error::EngineError::ToolFailed {
                    tool: "broken".into(),
                    detail: "nope".into(),
                })
            })),
        ]
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(vec![], "u1", "c1")
    }

    /// **Scenario**: each call yields one tool message; counts and tracker
    /// land in the update.
    #[tokio::test]
    async fn executes_batch_and_records() {
        let executor = ToolExecutor::new(ToolExecutorConfig::default());
        let calls = vec![
            ToolCall::new("c1", "echo", json!({"text": "one"})),
            ToolCall::new("c2", "echo", json!({"text": "two"})),
        ];
        let update = executor.execute_calls(&ctx(), &calls, &tools()).await;
        assert_eq!(update.tool_calls_delta, 2);
        assert_eq!(update.append_messages.len(), 2);
        assert_eq!(update.append_messages[0].content(), "one");
        let tracker = update.tool_tracker.expect("tracker returned");
        assert_eq!(tracker.total_calls(), 2);
        assert_eq!(tracker.calls_for("echo"), 2);
    }

    /// **Scenario**: a failing tool is recorded as a failed execution and
    /// surfaced as an error tool message; the batch continues.
    #[tokio::test]
    async fn tool_failure_recorded_not_propagated() {
        let executor = ToolExecutor::new(ToolExecutorConfig::default());
        let calls = vec![
            ToolCall::new("c1", "broken", json!({})),
            ToolCall::new("c2", "echo", json!({"text": "after"})),
        ];
        let update = executor.execute_calls(&ctx(), &calls, &tools()).await;
        assert_eq!(update.append_messages.len(), 2);
        assert!(update.append_messages[0].content().starts_with("Error:"));
        assert_eq!(update.append_messages[1].content(), "after");
        let tracker = update.tool_tracker.unwrap();
        assert!(!tracker.executions()[0].success);
        assert!(tracker.executions()[1].success);
    }

    /// **Scenario**: a missing tool synthesizes an error result instead of
    /// raising.
    #[tokio::test]
    async fn missing_tool_synthesizes_error_result() {
        let executor = ToolExecutor::new(ToolExecutorConfig::default());
        let calls = vec![ToolCall::new("c1", "ghost", json!({}))];
        let update = executor.execute_calls(&ctx(), &calls, &tools()).await;
        assert_eq!(update.append_messages.len(), 1);
        assert!(update.append_messages[0].content().contains("not available"));
        assert_eq!(update.tool_calls_delta, 1);
    }

    /// **Scenario**: strict strategy — a duplicate call mid-batch produces the
    /// finalization message instead of a second invocation.
    #[tokio::test]
    async fn strict_duplicate_stops_mid_batch() {
        let executor = ToolExecutor::new(ToolExecutorConfig {
            recursion_strategy: RecursionStrategy::Strict,
            ..ToolExecutorConfig::default()
        });
        let calls = vec![
            ToolCall::new("c1", "echo", json!({"text": "x"})),
            ToolCall::new("c2", "echo", json!({"text": "x"})),
        ];
        let update = executor.execute_calls(&ctx(), &calls, &tools()).await;
        // One tool result, then the synthesized assistant message.
        assert_eq!(update.tool_calls_delta, 1);
        assert_eq!(update.append_messages.len(), 2);
        assert!(update.append_messages[1].is_assistant());
        assert!(update.metadata.contains_key(META_TOOL_STOP));
    }

    /// **Scenario**: a slow tool is cut off by the per-call timeout and
    /// recorded as failed.
    #[tokio::test]
    async fn slow_tool_times_out() {
        let slow: Arc<dyn Tool> = Arc::new(FnTool::new("slow", |_| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("too late".to_string())
            })
        }));
        let executor = ToolExecutor::new(ToolExecutorConfig {
            timeout_seconds: 0,
            ..ToolExecutorConfig::default()
        });
        let calls = vec![ToolCall::new("c1", "slow", json!({}))];
        let update = executor.execute_calls(&ctx(), &calls, &[slow]).await;
        let tracker = update.tool_tracker.unwrap();
        assert!(!tracker.executions()[0].success);
        assert!(tracker.executions()[0].result.contains("timed out"));
    }
}
