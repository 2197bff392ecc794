#![allow(dead_code)]

use async_trait::async_trait;
use tokio::sync::Mutex;

use valet_bot::error::{Result, ValetBotError};
use valet_bot::interfaces::providers::{KnowledgeProvider, LookupOutcome};

/// Knowledge provider that always returns the same outcome.
pub struct StaticKnowledgeProvider {
    outcome: LookupOutcome,
}

impl StaticKnowledgeProvider {
    pub fn summary(text: &str) -> Self {
        Self {
            outcome: LookupOutcome::Summary(text.to_string()),
        }
    }

    pub fn not_found() -> Self {
        Self {
            outcome: LookupOutcome::NotFound,
        }
    }

    pub fn ambiguous() -> Self {
        Self {
            outcome: LookupOutcome::Ambiguous,
        }
    }
}

#[async_trait]
impl KnowledgeProvider for StaticKnowledgeProvider {
    async fn summarize(&self, _topic: &str) -> Result<LookupOutcome> {
        Ok(self.outcome.clone())
    }
}

/// Records the topics it was asked about, then answers like the static one.
pub struct RecordingKnowledgeProvider {
    pub topics: Mutex<Vec<String>>,
    outcome: LookupOutcome,
}

impl RecordingKnowledgeProvider {
    pub fn summary(text: &str) -> Self {
        Self {
            topics: Mutex::new(Vec::new()),
            outcome: LookupOutcome::Summary(text.to_string()),
        }
    }
}

#[async_trait]
impl KnowledgeProvider for RecordingKnowledgeProvider {
    async fn summarize(&self, topic: &str) -> Result<LookupOutcome> {
        self.topics.lock().await.push(topic.to_string());
        Ok(self.outcome.clone())
    }
}

/// Always fails with a transport-level provider error.
pub struct FailingKnowledgeProvider;

#[async_trait]
impl KnowledgeProvider for FailingKnowledgeProvider {
    async fn summarize(&self, _topic: &str) -> Result<LookupOutcome> {
        Err(ValetBotError::Provider("connection refused".to_string()))
    }
}
