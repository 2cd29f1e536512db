//! In-memory backend implementations.
//!
//! Real deployments plug provider-backed [`SearchBackend`] and
//! [`RetrieverBackend`] implementations into [`ToolAdapters`]; these
//! in-memory versions serve development and tests, where determinism matters
//! more than coverage.

use async_trait::async_trait;

use crate::state::Evidence;
use crate::tools::{RetrieverBackend, SearchBackend, ToolError};

/// Keyword-overlap retriever over a fixed document set.
///
/// Scores each document by how many query terms it contains and returns the
/// top matches; documents sharing no terms with the query are dropped, so an
/// off-topic query yields an empty result (which is what exercises the
/// web-search fallback path).
#[derive(Default, Debug)]
pub struct StaticRetriever {
    docs: Vec<Evidence>,
}

impl StaticRetriever {
    #[must_use]
    pub fn new(docs: Vec<Evidence>) -> Self {
        Self { docs }
    }

    /// Load an index file: one JSON evidence object per line.
    pub fn from_index_file(path: &str) -> Result<Self, ToolError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ToolError::Invalid(format!("cannot read index {path}: {e}")))?;
        let mut docs = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let doc: Evidence = serde_json::from_str(line).map_err(|e| {
                ToolError::Invalid(format!("bad index line {} in {path}: {e}", line_no + 1))
            })?;
            docs.push(doc);
        }
        Ok(Self::new(docs))
    }
}

#[async_trait]
impl RetrieverBackend for StaticRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Evidence>, ToolError> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .filter(|t| t.len() > 2)
            .map(str::to_string)
            .collect();
        let mut scored: Vec<(usize, &Evidence)> = self
            .docs
            .iter()
            .map(|doc| {
                let haystack = doc.text.to_lowercase();
                let hits = terms.iter().filter(|t| haystack.contains(*t)).count();
                (hits, doc)
            })
            .filter(|(hits, _)| *hits > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(hits, doc)| doc.clone().with_score(hits as f32))
            .collect())
    }
}

/// Search backend that returns canned results for every query.
pub struct StaticSearch {
    results: Vec<Evidence>,
}

impl StaticSearch {
    #[must_use]
    pub fn new(results: Vec<Evidence>) -> Self {
        Self { results }
    }
}

#[async_trait]
impl SearchBackend for StaticSearch {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<Evidence>, ToolError> {
        Ok(self.results.iter().take(max_results).cloned().collect())
    }

    async fn fetch(&self, url: &str) -> Result<Vec<Evidence>, ToolError> {
        Ok(self
            .results
            .first()
            .cloned()
            .map(|e| Evidence::new(e.text, url))
            .into_iter()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> StaticRetriever {
        StaticRetriever::new(vec![
            Evidence::new("The warranty covers accidental damage for two years.", "docs/warranty.md"),
            Evidence::new("Employees accrue vacation monthly.", "docs/hr.md"),
        ])
    }

    #[tokio::test]
    async fn retriever_ranks_by_term_overlap() {
        let docs = corpus().retrieve("warranty damage", 5).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, "docs/warranty.md");
        assert_eq!(docs[0].score, Some(2.0));
    }

    #[tokio::test]
    async fn retriever_returns_empty_for_off_topic_queries() {
        let docs = corpus().retrieve("quantum chromodynamics", 5).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn index_file_loads_one_evidence_per_line() {
        let path = std::env::temp_dir().join(format!("index-{}.jsonl", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "{\"text\": \"warranty covers damage\", \"source\": \"docs/warranty.md\"}\n\n\
             {\"text\": \"vacation accrues monthly\", \"source\": \"docs/hr.md\"}\n",
        )
        .unwrap();
        let retriever = StaticRetriever::from_index_file(path.to_str().unwrap()).unwrap();
        let docs = retriever.retrieve("warranty", 5).await.unwrap();
        assert_eq!(docs.len(), 1);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn malformed_index_lines_are_reported_with_position() {
        let path = std::env::temp_dir().join(format!("index-{}.jsonl", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{\"text\": \"ok\", \"source\": \"a\"}\nnot json\n").unwrap();
        let err = StaticRetriever::from_index_file(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
        std::fs::remove_file(path).unwrap();
    }
}
