use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, ValetBotError};
use crate::interfaces::providers::{KnowledgeProvider, LookupOutcome};

pub const DEFAULT_BASE_URL: &str = "https://en.wikipedia.org";

const SUMMARY_SENTENCES: usize = 2;

/// Knowledge lookups against the Wikipedia REST summary endpoint.
pub struct WikipediaProvider {
    client: reqwest::Client,
    base_url: String,
}

impl WikipediaProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for WikipediaProvider {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl KnowledgeProvider for WikipediaProvider {
    async fn summarize(&self, topic: &str) -> Result<LookupOutcome> {
        let url = format!(
            "{}/api/rest_v1/page/summary/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(topic)
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ValetBotError::Provider(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(LookupOutcome::NotFound);
        }
        if !response.status().is_success() {
            return Err(ValetBotError::Provider(format!(
                "summary request failed with status {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ValetBotError::Provider(e.to_string()))?;
        let page_type = body.get("type").and_then(|v| v.as_str()).unwrap_or("");
        if page_type == "disambiguation" {
            return Ok(LookupOutcome::Ambiguous);
        }

        let extract = body
            .get("extract")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if extract.is_empty() {
            return Ok(LookupOutcome::NotFound);
        }
        Ok(LookupOutcome::Summary(first_sentences(
            extract,
            SUMMARY_SENTENCES,
        )))
    }
}

fn first_sentences(text: &str, limit: usize) -> String {
    let mut seen = 0;
    let mut end = text.len();
    for (idx, _) in text.match_indices(". ") {
        seen += 1;
        if seen == limit {
            end = idx + 1;
            break;
        }
    }
    text[..end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_short_extracts_whole() {
        assert_eq!(first_sentences("One sentence only.", 2), "One sentence only.");
    }

    #[test]
    fn truncates_to_two_sentences() {
        let text = "First. Second. Third. Fourth.";
        assert_eq!(first_sentences(text, 2), "First. Second.");
    }
}
