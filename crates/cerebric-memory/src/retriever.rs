//! Retriever: the interface the Decision Loop queries for context before
//! composing a prompt. `KeywordRetriever` is the default implementation,
//! scoring by case-insensitive keyword match count over stored entries.

use crate::partition::Partition;
use crate::store::MemoryStore;
use anyhow::Result;
use regex::RegexBuilder;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedItem {
    pub score: f64,
    pub source: String,
    pub text: String,
    pub metadata: Value,
}

/// No ordering guarantees beyond monotonically non-increasing score.
pub trait Retriever {
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedItem>>;
}

/// Searches a fixed set of (partition, name) memory logs for entries whose
/// `text` field contains any whitespace-delimited query token, scoring by
/// match count. Grounded on the same case-insensitive substring matching
/// as the teacher's `MemoryStore::quick_search`, generalized from a single
/// regex pattern to a token-count score so results can be ranked.
pub struct KeywordRetriever<'a> {
    store: &'a MemoryStore,
    sources: Vec<(Partition, String)>,
}

impl<'a> KeywordRetriever<'a> {
    pub fn new(store: &'a MemoryStore, sources: Vec<(Partition, String)>) -> Self {
        Self { store, sources }
    }
}

impl<'a> Retriever for KeywordRetriever<'a> {
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedItem>> {
        let tokens: Vec<_> = query.split_whitespace().filter(|t| !t.is_empty()).collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let patterns: Vec<_> = tokens
            .iter()
            .map(|token| RegexBuilder::new(&regex::escape(token)).case_insensitive(true).build())
            .collect::<Result<_, _>>()?;

        let mut items = Vec::new();
        for (partition, name) in &self.sources {
            let entries = self.store.list_entries(partition, name, None)?;
            for entry in entries {
                let text = entry_text(&entry);
                let score: f64 = patterns.iter().filter(|p| p.is_match(&text)).count() as f64;
                if score > 0.0 {
                    items.push(RetrievedItem {
                        score,
                        source: format!("{partition}/{name}"),
                        text,
                        metadata: entry,
                    });
                }
            }
        }

        items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        items.truncate(k);
        Ok(items)
    }
}

fn entry_text(entry: &Value) -> String {
    if let Some(text) = entry.get("text").and_then(|v| v.as_str()) {
        return text.to_string();
    }
    if let Some(content) = entry.get("content").and_then(|v| v.as_str()) {
        return content.to_string();
    }
    entry.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_empty_memory_returns_empty_list_not_error() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        let retriever = KeywordRetriever::new(&store, vec![(Partition::Shared, "notes".into())]);
        let results = retriever.retrieve("anything", 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_retrieve_ranks_by_match_count() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        store
            .append(&Partition::Shared, "notes", json!({"text": "disk usage is high on the server"}))
            .unwrap();
        store
            .append(&Partition::Shared, "notes", json!({"text": "disk usage disk usage alert"}))
            .unwrap();
        store
            .append(&Partition::Shared, "notes", json!({"text": "unrelated note about weather"}))
            .unwrap();

        let retriever = KeywordRetriever::new(&store, vec![(Partition::Shared, "notes".into())]);
        let results = retriever.retrieve("disk usage", 5).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_retrieve_respects_k_limit() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        for i in 0..5 {
            store
                .append(&Partition::Shared, "notes", json!({"text": format!("alert {i}")}))
                .unwrap();
        }
        let retriever = KeywordRetriever::new(&store, vec![(Partition::Shared, "notes".into())]);
        let results = retriever.retrieve("alert", 2).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_blank_query_returns_empty() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        let retriever = KeywordRetriever::new(&store, vec![(Partition::Shared, "notes".into())]);
        assert!(retriever.retrieve("   ", 5).unwrap().is_empty());
    }
}
