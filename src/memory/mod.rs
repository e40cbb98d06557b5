//! Adaptive conversation memory: windowing, summarization, caching.
//!
//! [`MemoryManager`] is the authoritative implementation: adaptive window
//! sizing from conversation complexity, importance-based splitting, strategy
//! prompts, and a shared TTL [`SummaryCache`]. The simple non-adaptive
//! `MemoryNode` in `node::memory` is its lightweight sibling.

mod cache;
mod manager;

pub use cache::{CacheEntry, SummaryCache};
pub use manager::{
    FallbackStrategy, MemoryConfig, MemoryManager, SummaryStrategy, META_MEMORY_CACHE_HIT,
    META_MEMORY_FALLBACK, META_MEMORY_WINDOW,
};
