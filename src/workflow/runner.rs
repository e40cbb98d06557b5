//! Capability-based linear pipeline: the batteries-included way to run a
//! conversation turn without hand-assembling a graph.
//!
//! The runner drives start, memory, retrieval, the model loop, tool
//! execution, and end in a fixed order, skipping stages whose capability is
//! disabled or whose collaborator is absent. Routing after each model call is
//! decided by `route_after_model`: the finish reason is authoritative over
//! the mere presence of tool calls.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::context::{ContextUpdate, ExecutionContext};
use crate::error::EngineError;
use crate::executor::{ToolExecutor, ToolExecutorConfig, META_TOOL_STOP};
use crate::llm::{FinishReason, LlmClient, LlmResponse};
use crate::memory::{MemoryConfig, MemoryManager, SummaryCache};
use crate::message::Message;
use crate::node::{EndNode, RetrievalConfig, RetrievalNode, StartNode, WorkflowNode};
use crate::retrieval::Retriever;
use crate::tools::Tool;

/// Which stages of the pipeline are active.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub enable_memory: bool,
    pub enable_retrieval: bool,
    pub enable_tools: bool,
    /// Upper bound on model invocations in the main loop. When reached with
    /// tool calls still pending, the runner makes one wrap-up call with tools
    /// withheld instead of looping further.
    pub max_model_turns: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            enable_memory: true,
            enable_retrieval: true,
            enable_tools: true,
            max_model_turns: 5,
        }
    }
}

/// Where the pipeline goes after one model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRoute {
    /// Execute the requested tool calls, then call the model again.
    ExecuteTools,
    /// Budget exhausted with tools still requested: one wrap-up model call
    /// with tools withheld.
    Finalize,
    /// The response is final; stop the loop.
    End,
}

/// Routing rule applied after every model response.
///
/// The finish reason wins over tool-call presence: a `stop` response ends the
/// turn even if tool calls are attached. Tool calls are only executed when
/// the model explicitly finished with `tool_calls`, they are non-empty, and
/// the turn budget allows another round. Anything else ends the turn.
pub fn route_after_model(response: &LlmResponse, budget_exhausted: bool) -> ModelRoute {
    if response.finish_reason.is_stop() {
        return ModelRoute::End;
    }
    if response.finish_reason == FinishReason::ToolCalls && !response.tool_calls.is_empty() {
        if budget_exhausted {
            return ModelRoute::Finalize;
        }
        return ModelRoute::ExecuteTools;
    }
    ModelRoute::End
}

/// Linear conversation pipeline over a model, optional memory and retrieval,
/// and a tool belt.
///
/// **Interaction**: Construct with an `LlmClient`, attach collaborators with
/// the builder methods, then `run` one turn on an `ExecutionContext`.
pub struct PipelineRunner {
    llm: Arc<dyn LlmClient>,
    retriever: Option<Arc<dyn Retriever>>,
    tools: Vec<Arc<dyn Tool>>,
    memory_config: MemoryConfig,
    // Outlives individual runs so identical histories hit cached summaries.
    summary_cache: Arc<SummaryCache>,
    executor_config: ToolExecutorConfig,
    options: PipelineOptions,
}

impl PipelineRunner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        let memory_config = MemoryConfig::default();
        let summary_cache = Arc::new(SummaryCache::new(Duration::from_secs(
            memory_config.cache_ttl_seconds,
        )));
        Self {
            llm,
            retriever: None,
            tools: Vec::new(),
            memory_config,
            summary_cache,
            executor_config: ToolExecutorConfig::default(),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_memory_config(mut self, config: MemoryConfig) -> Self {
        self.summary_cache = Arc::new(SummaryCache::new(Duration::from_secs(
            config.cache_ttl_seconds,
        )));
        self.memory_config = config;
        self
    }

    pub fn with_executor_config(mut self, config: ToolExecutorConfig) -> Self {
        self.executor_config = config;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs one conversation turn and returns the merged context.
    ///
    /// Stages: start, memory (if enabled), retrieval (if enabled and a
    /// retriever is attached), then the model loop with tool rounds, then
    /// end. Model failures propagate; tool and retrieval failures are
    /// already absorbed into the context by their stages.
    pub async fn run(&self, ctx: ExecutionContext) -> Result<ExecutionContext, EngineError> {
        let mut ctx = ctx;
        self.apply_node(&mut ctx, &StartNode::new("start")).await?;

        if self.options.enable_memory {
            let manager = MemoryManager::new(self.memory_config.clone())
                .with_llm(Arc::clone(&self.llm))
                .with_cache(Arc::clone(&self.summary_cache));
            let update = manager.compact(&ctx).await;
            ctx.apply("memory", "memory", update);
        }

        if self.options.enable_retrieval {
            if let Some(retriever) = &self.retriever {
                let node = RetrievalNode::new("retrieval", RetrievalConfig::default())
                    .with_retriever(Arc::clone(retriever));
                self.apply_node(&mut ctx, &node).await?;
            }
        }

        self.model_loop(&mut ctx).await?;

        self.apply_node(&mut ctx, &EndNode::new("end")).await?;
        Ok(ctx)
    }

    async fn model_loop(&self, ctx: &mut ExecutionContext) -> Result<(), EngineError> {
        let tools_available = self.options.enable_tools && !self.tools.is_empty();
        let executor = ToolExecutor::new(self.executor_config.clone());
        let mut turns: u32 = 0;

        loop {
            let response = self.llm.invoke(&self.model_messages(ctx)).await?;
            turns += 1;
            self.append_response(ctx, &response);

            let budget_exhausted = turns >= self.options.max_model_turns || !tools_available;
            match route_after_model(&response, budget_exhausted) {
                ModelRoute::End => return Ok(()),
                ModelRoute::Finalize => {
                    if !tools_available {
                        warn!("model requested tools but none are available");
                    } else {
                        info!(turns, "model turn budget reached, wrapping up without tools");
                    }
                    let mut instruction = ContextUpdate::none();
                    instruction.append_messages.push(Message::system(
                        "Tool use is over for this turn. Answer the user now with \
                         the information already gathered; do not request tools.",
                    ));
                    ctx.apply("model", "model", instruction);
                    let wrap_up = self.llm.invoke(&self.model_messages(ctx)).await?;
                    // Tools are withheld, so any calls still attached are dropped.
                    let mut update = ContextUpdate::none();
                    update
                        .append_messages
                        .push(Message::assistant(wrap_up.content.clone()));
                    ctx.apply("model", "model", update);
                    return Ok(());
                }
                ModelRoute::ExecuteTools => {
                    let calls = ctx
                        .last_message()
                        .map(|m| m.pending_tool_calls().to_vec())
                        .unwrap_or_default();
                    let update = executor.execute_calls(ctx, &calls, &self.tools).await;
                    ctx.apply("tools", "tools", update);
                    if ctx.metadata.contains_key(META_TOOL_STOP) {
                        // The executor already synthesized the final answer.
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Messages sent to the model: a synthesized system preamble carrying the
    /// summary and retrieved context, then the conversation.
    fn model_messages(&self, ctx: &ExecutionContext) -> Vec<Message> {
        let mut preamble = String::new();
        if let Some(summary) = &ctx.conversation_summary {
            preamble.push_str("Summary of the earlier conversation:\n");
            preamble.push_str(summary);
        }
        if let Some(retrieved) = &ctx.retrieval_context {
            if !retrieved.is_empty() {
                if !preamble.is_empty() {
                    preamble.push_str("\n\n");
                }
                preamble.push_str("Relevant context:\n");
                preamble.push_str(retrieved);
            }
        }
        let mut messages = Vec::with_capacity(ctx.messages.len() + 1);
        if !preamble.is_empty() {
            messages.push(Message::system(preamble));
        }
        messages.extend(ctx.messages.iter().cloned());
        messages
    }

    fn append_response(&self, ctx: &mut ExecutionContext, response: &LlmResponse) {
        let mut update = ContextUpdate::none();
        let message = if response.tool_calls.is_empty() {
            Message::assistant(response.content.clone())
        } else {
            Message::assistant_with_tools(response.content.clone(), response.tool_calls.clone())
        };
        update.append_messages.push(message);
        ctx.apply("model", "model", update);
    }

    async fn apply_node(
        &self,
        ctx: &mut ExecutionContext,
        node: &dyn WorkflowNode,
    ) -> Result<(), EngineError> {
        let update = node.execute(ctx).await?;
        ctx.apply(node.node_id(), node.node_type(), update);
        Ok(())
    }
}
