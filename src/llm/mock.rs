//! Mock LLM for tests and examples.
//!
//! Returns scripted responses in order, then repeats a default. Counts
//! invocations so tests can assert cache hits, and can be built failing so
//! fallback paths are reachable without a real provider.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{LlmClient, LlmResponse};
use crate::error::EngineError;
use crate::message::Message;

/// Scripted LLM client: pops queued responses, then repeats the default.
///
/// **Interaction**: Implements `LlmClient`; used by MemoryManager and
/// pipeline tests in place of a provider.
pub struct MockLlm {
    queue: Mutex<VecDeque<LlmResponse>>,
    default: LlmResponse,
    fail_with: Option<String>,
    invocations: AtomicUsize,
}

impl MockLlm {
    /// A mock that always answers with the given text (finish reason "stop").
    pub fn fixed(content: impl Into<String>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default: LlmResponse::text(content),
            fail_with: None,
            invocations: AtomicUsize::new(0),
        }
    }

    /// A mock that plays the given responses in order, then repeats the last.
    pub fn scripted(responses: Vec<LlmResponse>) -> Self {
        let default = responses
            .last()
            .cloned()
            .unwrap_or_else(|| LlmResponse::text("ok"));
        Self {
            queue: Mutex::new(responses.into()),
            default,
            fail_with: None,
            invocations: AtomicUsize::new(0),
        }
    }

    /// A mock whose every invocation fails with the given detail.
    pub fn failing(detail: impl Into<String>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default: LlmResponse::text(""),
            fail_with: Some(detail.into()),
            invocations: AtomicUsize::new(0),
        }
    }

    /// Number of invoke() calls so far.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, _messages: &[Message]) -> Result<LlmResponse, EngineError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if let Some(detail) = &self.fail_with {
            return Err(EngineError::ModelFailed(detail.clone()));
        }
        let mut queue = self.queue.lock().expect("mock llm queue poisoned");
        Ok(queue.pop_front().unwrap_or_else(|| self.default.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FinishReason;
    use crate::message::ToolCall;
    use serde_json::json;

    /// **Scenario**: scripted responses come back in order, then the last repeats.
    #[tokio::test]
    async fn scripted_plays_in_order_then_repeats() {
        let llm = MockLlm::scripted(vec![
            LlmResponse::with_tool_calls("", vec![ToolCall::new("c1", "search", json!({}))]),
            LlmResponse::text("done"),
        ]);
        let first = llm.invoke(&[]).await.unwrap();
        assert_eq!(first.finish_reason, FinishReason::ToolCalls);
        let second = llm.invoke(&[]).await.unwrap();
        assert_eq!(second.content, "done");
        let third = llm.invoke(&[]).await.unwrap();
        assert_eq!(third.content, "done");
        assert_eq!(llm.invocations(), 3);
    }

    /// **Scenario**: failing mock returns ModelFailed with the detail.
    #[tokio::test]
    async fn failing_mock_returns_model_failed() {
        let llm = MockLlm::failing("offline");
        let err = llm.invoke(&[]).await.unwrap_err();
        assert!(err.to_string().contains("offline"), "{}", err);
    }
}
