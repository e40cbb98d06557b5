//! Memory manager: adaptive windowing, importance-based splitting, pluggable
//! summarization with cached results and graceful fallbacks.
//!
//! The authoritative memory implementation (the simple `MemoryNode` is its
//! non-adaptive sibling). Given a context whose history outgrew the window,
//! the manager decides how much to keep verbatim, which overflow messages to
//! summarize, and what to do when summarization is impossible.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::cache::SummaryCache;
use crate::context::{ContextUpdate, ExecutionContext};
use crate::llm::LlmClient;
use crate::message::Message;

/// Metadata keys written by the manager.
pub const META_MEMORY_WINDOW: &str = "memory_window_size";
pub const META_MEMORY_FALLBACK: &str = "memory_fallback";
pub const META_MEMORY_CACHE_HIT: &str = "memory_cache_hit";

/// Terms that mark a conversation as technical for the complexity score.
const TECHNICAL_TERMS: [&str; 7] = [
    "api",
    "function",
    "code",
    "algorithm",
    "parameter",
    "configuration",
    "implementation",
];

/// How overflow messages are turned into a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStrategy {
    /// Flat factual summary of everything dropped.
    #[default]
    Simple,
    /// Re-rank by importance, keep the top 10, ask for Context / Discussion /
    /// Status sections.
    Intelligent,
    /// Fixed FACTS / DECISIONS / QUESTIONS / ACTIONS / CONTEXT template.
    Structured,
}

/// What to do when summarization fails or no model handle is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackStrategy {
    /// Drop the older messages, keep only the recent window.
    #[default]
    Truncation,
    /// Keep every 3rd older message, prepended to the recent window.
    Compression,
    /// Leave the history unchanged, flag the skip in metadata.
    Skip,
}

/// Memory manager configuration; immutable per manager instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub base_window_size: usize,
    pub min_window_size: usize,
    pub max_window_size: usize,
    /// Resize the window from conversation complexity when on.
    pub adaptive_mode: bool,
    /// Guarantee a recent tail and pick the rest by importance when on.
    pub prioritize_recent: bool,
    pub cache_summaries: bool,
    pub cache_ttl_seconds: u64,
    pub summary_strategy: SummaryStrategy,
    pub fallback_strategy: FallbackStrategy,
    /// Complexity score above which the window expands.
    pub complexity_threshold: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            base_window_size: 10,
            min_window_size: 5,
            max_window_size: 20,
            adaptive_mode: true,
            prioritize_recent: true,
            cache_summaries: true,
            cache_ttl_seconds: 3600,
            summary_strategy: SummaryStrategy::default(),
            fallback_strategy: FallbackStrategy::default(),
            complexity_threshold: 0.7,
        }
    }
}

/// Adaptive memory manager.
///
/// **Interaction**: Used directly by callers or wrapped by a Memory node.
/// `compact` returns the same `ContextUpdate` delta nodes return, so both
/// compose identically with the orchestrator.
pub struct MemoryManager {
    config: MemoryConfig,
    llm: Option<Arc<dyn LlmClient>>,
    cache: Arc<SummaryCache>,
}

impl MemoryManager {
    pub fn new(config: MemoryConfig) -> Self {
        let cache = Arc::new(SummaryCache::new(Duration::from_secs(
            config.cache_ttl_seconds,
        )));
        Self {
            config,
            llm: None,
            cache,
        }
    }

    /// Sets the model handle used for summarization.
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Replaces the cache with a shared instance (cross-run sharing).
    pub fn with_cache(mut self, cache: Arc<SummaryCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<SummaryCache> {
        &self.cache
    }

    /// Compacts the context's history if it outgrew the (possibly adaptive)
    /// window. No-op when it fits. Never fails: summarization errors fall
    /// back per `fallback_strategy`.
    pub async fn compact(&self, ctx: &ExecutionContext) -> ContextUpdate {
        let window = self.effective_window(ctx);
        if ctx.messages.len() <= window {
            return ContextUpdate::none();
        }

        let (recent, older) = self.split_messages(&ctx.messages, window);
        debug!(
            window,
            kept = recent.len(),
            overflow = older.len(),
            "compacting conversation history"
        );

        let mut update = ContextUpdate::none().with_metadata(
            META_MEMORY_WINDOW,
            Value::Number((window as u64).into()),
        );

        match self.summarize(&older).await {
            Some((summary, cache_hit)) => {
                update.messages = Some(recent);
                update.conversation_summary = Some(summary);
                update
                    .metadata
                    .insert(META_MEMORY_CACHE_HIT.into(), Value::Bool(cache_hit));
            }
            None => self.apply_fallback(&mut update, recent, &older),
        }
        update
    }

    /// Window size for this context: the base size, or the adaptive size
    /// derived from the complexity score, clamped to [min, max].
    pub fn effective_window(&self, ctx: &ExecutionContext) -> usize {
        if !self.config.adaptive_mode {
            return self.config.base_window_size;
        }
        let score = self.complexity_score(ctx);
        let base = self.config.base_window_size as f64;
        let sized = if score > self.config.complexity_threshold {
            base * (1.0 + (score - self.config.complexity_threshold))
        } else if score < 0.3 {
            base * 0.8
        } else {
            base
        };
        (sized.round() as usize).clamp(self.config.min_window_size, self.config.max_window_size)
    }

    /// Complexity in [0, 1]: weighted sum of tool usage, recent length
    /// variance, question density, technical-term density, and error-state
    /// size (weights 0.3 / 0.2 / 0.2 / 0.2 / 0.1, each factor capped at 1).
    pub fn complexity_score(&self, ctx: &ExecutionContext) -> f64 {
        let last_10: Vec<&Message> = ctx.messages.iter().rev().take(10).collect();

        let tool_density = (ctx.tool_call_count as f64 / 5.0).min(1.0);

        let lengths: Vec<usize> = last_10.iter().map(|m| m.content().len()).collect();
        let length_variance = match (lengths.iter().max(), lengths.iter().min()) {
            (Some(max), Some(min)) => (((max - min) as f64) / 500.0).min(1.0),
            _ => 0.0,
        };

        let questions = last_10.iter().filter(|m| m.content().contains('?')).count();
        let question_density = (questions as f64 / 5.0).min(1.0);

        let text: String = last_10
            .iter()
            .map(|m| m.content().to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let term_hits: usize = TECHNICAL_TERMS
            .iter()
            .map(|t| text.matches(t).count())
            .sum();
        let technical_density = (term_hits as f64 / 3.0).min(1.0);

        let error_factor = (ctx.error_state.len() as f64 / 3.0).min(1.0);

        0.3 * tool_density
            + 0.2 * length_variance
            + 0.2 * question_density
            + 0.2 * technical_density
            + 0.1 * error_factor
    }

    /// Splits the history into (kept, overflow). With `prioritize_recent`,
    /// the last `window / 2` turns (capped at a quarter of the total) are
    /// guaranteed; the rest of the budget goes to the highest-scoring earlier
    /// messages, kept in original order.
    fn split_messages(
        &self,
        messages: &[Message],
        window: usize,
    ) -> (Vec<Message>, Vec<Message>) {
        let total = messages.len();
        if !self.config.prioritize_recent {
            let split = total - window;
            return (messages[split..].to_vec(), messages[..split].to_vec());
        }

        let guaranteed = (window / 2).min(total / 4).min(window);
        let tail_start = total - guaranteed;
        let budget = window - guaranteed;

        let mut scored: Vec<(usize, f64)> = messages[..tail_start]
            .iter()
            .enumerate()
            .map(|(i, m)| (i, importance_score(m)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let mut keep_indices: Vec<usize> = scored.into_iter().take(budget).map(|(i, _)| i).collect();
        keep_indices.sort_unstable();

        let mut kept = Vec::with_capacity(window);
        let mut overflow = Vec::new();
        for (i, m) in messages[..tail_start].iter().enumerate() {
            if keep_indices.binary_search(&i).is_ok() {
                kept.push(m.clone());
            } else {
                overflow.push(m.clone());
            }
        }
        kept.extend_from_slice(&messages[tail_start..]);
        (kept, overflow)
    }

    /// Summarizes the overflow via cache or model. Returns `(summary,
    /// cache_hit)`, or `None` when no model is set or the call failed.
    async fn summarize(&self, older: &[Message]) -> Option<(String, bool)> {
        if older.is_empty() {
            return None;
        }
        let key = SummaryCache::key_for(older);
        if self.config.cache_summaries {
            if let Some(summary) = self.cache.get(key) {
                debug!(key, "summary cache hit");
                return Some((summary, true));
            }
        }

        let llm = self.llm.as_ref()?;
        let prompt = self.build_prompt(older);
        match llm.invoke(&[Message::human(prompt)]).await {
            Ok(response) if !response.content.trim().is_empty() => {
                if self.config.cache_summaries {
                    self.cache.insert(key, response.content.clone(), older.len());
                }
                Some((response.content, false))
            }
            Ok(_) => {
                warn!("summarization returned empty content");
                None
            }
            Err(e) => {
                warn!(error = %e, "summarization failed");
                None
            }
        }
    }

    fn build_prompt(&self, older: &[Message]) -> String {
        match self.config.summary_strategy {
            SummaryStrategy::Simple => format!(
                "Summarize the following conversation factually and concisely. \
                 Keep names, numbers, and decisions:\n\n{}",
                render_conversation(older)
            ),
            SummaryStrategy::Intelligent => {
                // Re-rank the overflow and show the model only the top 10.
                let mut ranked: Vec<&Message> = older.iter().collect();
                ranked.sort_by(|a, b| {
                    importance_score(b)
                        .partial_cmp(&importance_score(a))
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                let top: Vec<Message> = ranked.into_iter().take(10).cloned().collect();
                format!(
                    "Summarize the key points of this conversation in three sections \
                     titled Context, Discussion, and Status:\n\n{}",
                    render_conversation(&top)
                )
            }
            SummaryStrategy::Structured => format!(
                "Extract from this conversation, using exactly these headings:\n\
                 FACTS:\nDECISIONS:\nQUESTIONS:\nACTIONS:\nCONTEXT:\n\n{}",
                render_conversation(older)
            ),
        }
    }

    fn apply_fallback(
        &self,
        update: &mut ContextUpdate,
        recent: Vec<Message>,
        older: &[Message],
    ) {
        let name = match self.config.fallback_strategy {
            FallbackStrategy::Truncation => {
                update.messages = Some(recent);
                "truncation"
            }
            FallbackStrategy::Compression => {
                let mut kept: Vec<Message> =
                    older.iter().step_by(3).cloned().collect();
                kept.extend(recent);
                update.messages = Some(kept);
                "compression"
            }
            FallbackStrategy::Skip => "skip",
        };
        warn!(fallback = name, "summarization unavailable, applying fallback");
        update
            .metadata
            .insert(META_MEMORY_FALLBACK.into(), Value::String(name.into()));
    }
}

/// Importance heuristic for one message. Questions, decisions, problems, and
/// instructions add weight; greetings and casual chatter subtract; length and
/// long assistant replies add.
pub(crate) fn importance_score(message: &Message) -> f64 {
    let content = message.content();
    let lower = content.to_lowercase();
    let mut score = 0.0;

    if content.contains('?') {
        score += 2.0;
    }
    const DECISIONS: [&str; 4] = ["decide", "decision", "agree", "confirm"];
    if DECISIONS.iter().any(|k| lower.contains(k)) {
        score += 2.0;
    }
    const PROBLEMS: [&str; 5] = ["error", "problem", "issue", "fail", "bug"];
    if PROBLEMS.iter().any(|k| lower.contains(k)) {
        score += 2.0;
    }
    const INSTRUCTIONS: [&str; 4] = ["please", "need", "must", "should"];
    if INSTRUCTIONS.iter().any(|k| lower.contains(k)) {
        score += 1.5;
    }
    const CASUAL: [&str; 6] = ["hello", "hi!", "thanks", "thank you", "cool", "lol"];
    if CASUAL.iter().any(|k| lower.contains(k)) {
        score -= 1.0;
    }

    score += (content.len() as f64 / 500.0).min(1.0);
    if message.is_assistant() && content.len() > 300 {
        score += 0.5;
    }
    score
}

fn render_conversation(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role(), m.content()))
        .collect::<Vec<_>>()
        .join("\n")
}
