//! Per-run tool execution tracker: history, budgets, recursion detection.
//!
//! One tracker per workflow run, created lazily by the executor and carried
//! on the `ExecutionContext` between node visits. The tracker owns all data
//! the stop heuristics need: the chronological execution list, per-tool call
//! counts, and the consecutive-repeat counter.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{RecursionStrategy, ToolExecutorConfig};

/// One recorded tool call, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecution {
    pub tool_name: String,
    pub arguments: Value,
    /// Stringified result, or the error text on failure.
    pub result: String,
    pub duration_ms: u64,
    pub success: bool,
}

/// Why tool execution must stop instead of running another call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    TotalBudgetExhausted { limit: u32 },
    ToolBudgetExhausted { tool: String, limit: u32 },
    ConsecutiveLimit { tool: String, limit: u32 },
    RecursionDetected { detail: String },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TotalBudgetExhausted { limit } => {
                write!(f, "total tool-call budget exhausted ({limit} calls)")
            }
            Self::ToolBudgetExhausted { tool, limit } => {
                write!(f, "call budget for tool '{tool}' exhausted ({limit} calls)")
            }
            Self::ConsecutiveLimit { tool, limit } => {
                write!(f, "tool '{tool}' called {limit} times in a row")
            }
            Self::RecursionDetected { detail } => {
                write!(f, "unproductive tool loop detected: {detail}")
            }
        }
    }
}

/// Chronological tool-call history plus the counters the stop checks read.
///
/// **Interaction**: Owned by `ExecutionContext::tool_tracker`; `ToolExecutor`
/// clones it out, records executions, and writes it back through the node's
/// `ContextUpdate`. Never shared across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolExecutionTracker {
    executions: Vec<ToolExecution>,
    call_counts: HashMap<String, u32>,
    last_tool: Option<String>,
    consecutive_count: u32,
}

impl ToolExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one execution (success or failure) and updates counters.
    pub fn record(&mut self, execution: ToolExecution) {
        *self
            .call_counts
            .entry(execution.tool_name.clone())
            .or_insert(0) += 1;
        if self.last_tool.as_deref() == Some(execution.tool_name.as_str()) {
            self.consecutive_count += 1;
        } else {
            self.last_tool = Some(execution.tool_name.clone());
            self.consecutive_count = 1;
        }
        self.executions.push(execution);
    }

    pub fn total_calls(&self) -> u32 {
        self.executions.len() as u32
    }

    pub fn calls_for(&self, tool: &str) -> u32 {
        self.call_counts.get(tool).copied().unwrap_or(0)
    }

    pub fn executions(&self) -> &[ToolExecution] {
        &self.executions
    }

    /// The last `progress_window` executions, oldest first.
    fn window(&self, progress_window: usize) -> &[ToolExecution] {
        let start = self.executions.len().saturating_sub(progress_window);
        &self.executions[start..]
    }

    /// Fails closed: returns the first stop reason that applies to the
    /// recorded history, or `None` to continue.
    ///
    /// Checks, in order: total budget, per-tool budget (configured max or the
    /// global max as fallback), consecutive-repeat limit, then recursion per
    /// the configured strategy over the last `progress_window` executions.
    pub fn should_continue_execution(&self, config: &ToolExecutorConfig) -> Option<StopReason> {
        self.check_next_call(config, None)
    }

    /// Like `should_continue_execution`, but also considers the call about to
    /// be made: under the strict strategy a pending (tool, args) pair that
    /// repeats one already in the window counts as recursion before it runs.
    pub(crate) fn check_next_call(
        &self,
        config: &ToolExecutorConfig,
        pending: Option<(&str, &Value)>,
    ) -> Option<StopReason> {
        if self.total_calls() >= config.max_total_calls {
            return Some(StopReason::TotalBudgetExhausted {
                limit: config.max_total_calls,
            });
        }
        for (tool, count) in &self.call_counts {
            let limit = config
                .max_calls_per_tool
                .get(tool)
                .copied()
                .unwrap_or(config.max_total_calls);
            if *count >= limit {
                return Some(StopReason::ToolBudgetExhausted {
                    tool: tool.clone(),
                    limit,
                });
            }
        }
        if self.consecutive_count >= config.max_consecutive_calls {
            if let Some(tool) = &self.last_tool {
                return Some(StopReason::ConsecutiveLimit {
                    tool: tool.clone(),
                    limit: config.max_consecutive_calls,
                });
            }
        }
        if config.enable_recursion_detection {
            if let Some(detail) = self.detect_recursion(config, pending) {
                return Some(StopReason::RecursionDetected { detail });
            }
        }
        None
    }

    fn detect_recursion(
        &self,
        config: &ToolExecutorConfig,
        pending: Option<(&str, &Value)>,
    ) -> Option<String> {
        let window = self.window(config.progress_window);
        match config.recursion_strategy {
            RecursionStrategy::Strict => Self::detect_strict(window, pending),
            RecursionStrategy::Adaptive => Self::detect_adaptive(window),
            RecursionStrategy::Lenient => Self::detect_lenient(window),
        }
    }

    /// Strict: any repeated (tool, args) combination in the window, including
    /// the pending call when one is supplied.
    fn detect_strict(window: &[ToolExecution], pending: Option<(&str, &Value)>) -> Option<String> {
        let mut seen: Vec<(&str, &Value)> = Vec::with_capacity(window.len() + 1);
        for e in window {
            let key = (e.tool_name.as_str(), &e.arguments);
            if seen.contains(&key) {
                return Some(format!(
                    "repeated call to '{}' with identical arguments",
                    e.tool_name
                ));
            }
            seen.push(key);
        }
        if let Some(key) = pending {
            if seen.contains(&key) {
                return Some(format!(
                    "repeated call to '{}' with identical arguments",
                    key.0
                ));
            }
        }
        None
    }

    /// Adaptive: no-progress (3x same tool, same result), ping-pong
    /// (A,B,A,B over the last 4), or error loop (2 of last 3 are failures
    /// of the same tool).
    fn detect_adaptive(window: &[ToolExecution]) -> Option<String> {
        if window.len() >= 3 {
            let tail = &window[window.len() - 3..];
            let first = &tail[0];
            if tail
                .iter()
                .all(|e| e.tool_name == first.tool_name && e.result == first.result)
            {
                return Some(format!(
                    "tool '{}' returned the same result 3 times",
                    first.tool_name
                ));
            }
        }
        if window.len() >= 4 {
            let tail = &window[window.len() - 4..];
            let (a, b) = (&tail[0].tool_name, &tail[1].tool_name);
            if a != b && tail[2].tool_name == *a && tail[3].tool_name == *b {
                return Some(format!("ping-pong between '{a}' and '{b}'"));
            }
        }
        if window.len() >= 3 {
            let tail = &window[window.len() - 3..];
            let mut failures: HashMap<&str, u32> = HashMap::new();
            for e in tail.iter().filter(|e| !e.success) {
                *failures.entry(e.tool_name.as_str()).or_insert(0) += 1;
            }
            if let Some((tool, _)) = failures.iter().find(|(_, n)| **n >= 2) {
                return Some(format!("tool '{tool}' keeps failing"));
            }
        }
        None
    }

    /// Lenient: only flags a tight failing loop — last 5 calls are one tool,
    /// results vary by at most 2 distinct values, and the last 3 all failed.
    fn detect_lenient(window: &[ToolExecution]) -> Option<String> {
        if window.len() < 5 {
            return None;
        }
        let tail = &window[window.len() - 5..];
        let tool = &tail[0].tool_name;
        if !tail.iter().all(|e| e.tool_name == *tool) {
            return None;
        }
        let mut results: Vec<&str> = Vec::new();
        for e in tail {
            if !results.contains(&e.result.as_str()) {
                results.push(&e.result);
            }
        }
        if results.len() > 2 {
            return None;
        }
        if tail[2..].iter().all(|e| !e.success) {
            Some(format!("tool '{tool}' stuck in a failing loop"))
        } else {
            None
        }
    }
}
