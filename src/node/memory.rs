//! Simple memory node: fixed-window history compaction.
//!
//! The non-adaptive sibling of `memory::MemoryManager` (which is the
//! authoritative implementation). This node keeps the last `memory_window`
//! turns verbatim; when a model handle is set and no summary exists yet, the
//! overflow is summarized. An already-summarized overflow is simply trimmed;
//! only a missing model or a failed summarization records a fallback marker.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::WorkflowNode;
use crate::context::{ContextUpdate, ExecutionContext};
use crate::error::EngineError;
use crate::llm::LlmClient;
use crate::message::Message;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryNodeConfig {
    pub memory_window: usize,
}

impl Default for MemoryNodeConfig {
    fn default() -> Self {
        Self { memory_window: 10 }
    }
}

pub struct MemoryNode {
    node_id: String,
    config: MemoryNodeConfig,
    llm: Option<Arc<dyn LlmClient>>,
}

impl MemoryNode {
    pub fn new(node_id: impl Into<String>, config: MemoryNodeConfig) -> Self {
        Self {
            node_id: node_id.into(),
            config,
            llm: None,
        }
    }

    /// Sets the model handle used to summarize overflow.
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    fn fallback_key(&self) -> String {
        format!("memory_{}_fallback", self.node_id)
    }
}

#[async_trait]
impl WorkflowNode for MemoryNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn node_type(&self) -> &'static str {
        "memory"
    }

    fn validate_config(&self) -> Vec<String> {
        if self.config.memory_window == 0 {
            vec!["memory_window must be at least 1".to_string()]
        } else {
            Vec::new()
        }
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<ContextUpdate, EngineError> {
        let window = self.config.memory_window;
        if ctx.messages.len() <= window {
            return Ok(ContextUpdate::none());
        }

        let split = ctx.messages.len() - window;
        let older = &ctx.messages[..split];
        let recent = ctx.messages[split..].to_vec();
        let mut update = ContextUpdate::none();

        if ctx.conversation_summary.is_some() {
            // The overflow is already covered by a summary; keep trimming.
            update.messages = Some(recent);
            return Ok(update);
        }

        if let Some(llm) = &self.llm {
            let prompt = format!(
                "Summarize the following conversation factually and concisely:\n\n{}",
                older
                    .iter()
                    .map(|m| format!("{}: {}", m.role(), m.content()))
                    .collect::<Vec<_>>()
                    .join("\n")
            );
            match llm.invoke(&[Message::human(prompt)]).await {
                Ok(response) if !response.content.trim().is_empty() => {
                    update.messages = Some(recent);
                    update.conversation_summary = Some(response.content);
                    return Ok(update);
                }
                Ok(_) => warn!(node_id = %self.node_id, "summary came back empty"),
                Err(e) => warn!(node_id = %self.node_id, error = %e, "summarization failed"),
            }
        }

        // No model or summarization failed: truncate and record the fallback.
        update.messages = Some(recent);
        update
            .metadata
            .insert(self.fallback_key(), Value::String("truncation".into()));
        Ok(update)
    }
}
