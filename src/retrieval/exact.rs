//! Exact multi-term containment search.

use super::{validate_query, QueryResult, SearchStrategy};
use crate::error::Result;
use crate::store::IndexStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// Returns chunks whose content contains every whitespace-separated query
/// term as a substring. Matches are unranked; order is the store's.
#[derive(Clone)]
pub struct ExactMatchSearch {
    store: Arc<dyn IndexStore>,
    limit: usize,
}

impl ExactMatchSearch {
    pub fn new(store: Arc<dyn IndexStore>, limit: usize) -> Self {
        Self { store, limit }
    }

    /// Whitespace-separated terms, empty tokens discarded.
    pub fn search_terms(query: &str) -> Vec<String> {
        query.split_whitespace().map(str::to_string).collect()
    }
}

#[async_trait]
impl SearchStrategy for ExactMatchSearch {
    fn name(&self) -> &'static str {
        "exact"
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<QueryResult>> {
        let terms = Self::search_terms(validate_query(query)?);
        let docs = self.store.filter_contains_all(&terms, self.limit).await?;
        Ok(docs.into_iter().map(QueryResult::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::testing::{doc, store_with};

    #[test]
    fn test_search_terms() {
        assert_eq!(
            ExactMatchSearch::search_terms("  뇌이징   어메이징 "),
            vec!["뇌이징".to_string(), "어메이징".to_string()]
        );
    }

    #[tokio::test]
    async fn test_every_term_must_be_present() {
        let store = store_with(vec![
            doc("both", 0.0, "뇌이징 어메이징 정말", vec![]),
            doc("one", 0.0, "뇌이징", vec![]),
            doc("glued", 0.0, "뇌이징어메이징", vec![]),
        ])
        .await;

        let results = ExactMatchSearch::new(store, 10)
            .search("뇌이징 어메이징")
            .await
            .unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids, vec!["both", "glued"]);
        for result in &results {
            for term in ExactMatchSearch::search_terms("뇌이징 어메이징") {
                assert!(result.content.contains(&term));
            }
        }
    }

    #[tokio::test]
    async fn test_limit_and_empty() {
        let docs = (0..15).map(|i| doc("v", i as f64, "같은 말", vec![])).collect();
        let store = store_with(docs).await;
        let search = ExactMatchSearch::new(store, 10);

        assert_eq!(search.search("같은").await.unwrap().len(), 10);
        assert!(search.search("다른").await.unwrap().is_empty());
    }
}
