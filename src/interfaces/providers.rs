use async_trait::async_trait;

use crate::error::Result;

/// Outcome of a knowledge lookup. Lookup misses are data, not errors: the
/// interpreter maps each variant to a fixed user-facing message and never
/// shows the caller a raw provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Summary(String),
    NotFound,
    Ambiguous,
}

#[async_trait]
pub trait KnowledgeProvider: Send + Sync {
    /// Returns a 1-2 sentence summary of the topic, or a typed miss.
    async fn summarize(&self, topic: &str) -> Result<LookupOutcome>;
}
