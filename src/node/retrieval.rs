//! Retrieval node: queries the retriever with the last human message.
//!
//! Retrieval failure must never abort the run: exceptions are swallowed,
//! logged, and an empty retrieval context is returned.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::WorkflowNode;
use crate::context::{ContextUpdate, ExecutionContext};
use crate::error::EngineError;
use crate::retrieval::Retriever;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Documents beyond this are dropped before concatenation.
    pub max_documents: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { max_documents: 5 }
    }
}

pub struct RetrievalNode {
    node_id: String,
    config: RetrievalConfig,
    retriever: Option<Arc<dyn Retriever>>,
}

impl RetrievalNode {
    pub fn new(node_id: impl Into<String>, config: RetrievalConfig) -> Self {
        Self {
            node_id: node_id.into(),
            config,
            retriever: None,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }
}

#[async_trait]
impl WorkflowNode for RetrievalNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn node_type(&self) -> &'static str {
        "retrieval"
    }

    fn validate_config(&self) -> Vec<String> {
        if self.config.max_documents == 0 {
            vec!["max_documents must be at least 1".to_string()]
        } else {
            Vec::new()
        }
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<ContextUpdate, EngineError> {
        let mut update = ContextUpdate::none();

        let (Some(retriever), Some(query)) = (
            self.retriever.as_ref(),
            ctx.last_human_message().map(|m| m.content().to_string()),
        ) else {
            update.retrieval_context = Some(String::new());
            return Ok(update);
        };

        match retriever.retrieve(&query).await {
            Ok(documents) => {
                let joined = documents
                    .iter()
                    .take(self.config.max_documents)
                    .map(|d| d.page_content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                debug!(
                    node_id = %self.node_id,
                    documents = documents.len().min(self.config.max_documents),
                    "retrieved context"
                );
                update.retrieval_context = Some(joined);
            }
            Err(e) => {
                warn!(node_id = %self.node_id, error = %e, "retrieval failed, continuing without context");
                update.retrieval_context = Some(String::new());
            }
        }
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::retrieval::{Document, MockRetriever};

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(vec![Message::human("what is rust?")], "u1", "c1")
    }

    /// **Scenario**: documents are truncated to max_documents and joined with
    /// a blank line.
    #[tokio::test]
    async fn retrieves_and_joins() {
        let node = RetrievalNode::new("r1", RetrievalConfig { max_documents: 2 }).with_retriever(
            Arc::new(MockRetriever::new(vec![
                Document::new("first"),
                Document::new("second"),
                Document::new("third"),
            ])),
        );
        let update = node.execute(&ctx()).await.unwrap();
        assert_eq!(update.retrieval_context.as_deref(), Some("first\n\nsecond"));
    }

    /// **Scenario**: no retriever handle — empty context, not an error.
    #[tokio::test]
    async fn no_retriever_empty_context() {
        let node = RetrievalNode::new("r1", RetrievalConfig::default());
        let update = node.execute(&ctx()).await.unwrap();
        assert_eq!(update.retrieval_context.as_deref(), Some(""));
    }

    /// **Scenario**: no human message — empty context.
    #[tokio::test]
    async fn no_human_message_empty_context() {
        let node = RetrievalNode::new("r1", RetrievalConfig::default())
            .with_retriever(Arc::new(MockRetriever::new(vec![Document::new("doc")])));
        let ctx = ExecutionContext::new(vec![Message::assistant("hello")], "u1", "c1");
        let update = node.execute(&ctx).await.unwrap();
        assert_eq!(update.retrieval_context.as_deref(), Some(""));
    }

    /// **Scenario**: retriever failure is swallowed — empty context, no
    /// error_state, run continues.
    #[tokio::test]
    async fn failure_swallowed() {
        let node = RetrievalNode::new("r1", RetrievalConfig::default())
            .with_retriever(Arc::new(MockRetriever::failing("index down")));
        let update = node.execute(&ctx()).await.unwrap();
        assert_eq!(update.retrieval_context.as_deref(), Some(""));
        assert!(update.error_state.is_empty());
    }
}
