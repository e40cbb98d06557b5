//! Delay node: fixed, random, or exponential pause.
//!
//! The one node type whose execution is intentionally non-instantaneous.
//! Exponential backoff keys off the node's own retry counter in
//! `error_state`; the computed delay is clamped to `max_duration_ms` when set.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::WorkflowNode;
use crate::context::{ContextUpdate, ExecutionContext};
use crate::error::EngineError;

const DELAY_TYPES: [&str; 3] = ["fixed", "random", "exponential"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub delay_type: String,
    /// Base duration: exact for fixed, upper bound for random, multiplied by
    /// 2^retries for exponential.
    pub duration_ms: u64,
    pub max_duration_ms: Option<u64>,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            delay_type: "fixed".to_string(),
            duration_ms: 1000,
            max_duration_ms: None,
        }
    }
}

pub struct DelayNode {
    node_id: String,
    config: DelayConfig,
}

impl DelayNode {
    pub fn new(node_id: impl Into<String>, config: DelayConfig) -> Self {
        Self {
            node_id: node_id.into(),
            config,
        }
    }

    /// Delay for this visit in milliseconds, before clamping.
    fn compute_delay_ms(&self, ctx: &ExecutionContext) -> u64 {
        match self.config.delay_type.as_str() {
            "random" => rand::thread_rng().gen_range(0..=self.config.duration_ms),
            "exponential" => {
                let retries = ctx.retry_count(&self.node_id);
                self.config
                    .duration_ms
                    .saturating_mul(1u64.checked_shl(retries).unwrap_or(u64::MAX))
            }
            _ => self.config.duration_ms,
        }
    }
}

#[async_trait]
impl WorkflowNode for DelayNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn node_type(&self) -> &'static str {
        "delay"
    }

    fn validate_config(&self) -> Vec<String> {
        if DELAY_TYPES.contains(&self.config.delay_type.as_str()) {
            Vec::new()
        } else {
            vec![format!(
                "delay_type must be one of {DELAY_TYPES:?}, got '{}'",
                self.config.delay_type
            )]
        }
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<ContextUpdate, EngineError> {
        let mut delay_ms = self.compute_delay_ms(ctx);
        if let Some(max) = self.config.max_duration_ms {
            delay_ms = delay_ms.min(max);
        }
        debug!(node_id = %self.node_id, delay_ms, "delaying");
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(ContextUpdate::none().with_metadata(
            format!("delay_{}_ms", self.node_id),
            Value::Number(delay_ms.into()),
        ))
    }
}
