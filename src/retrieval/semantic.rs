//! Embedding nearest-neighbor search.

use super::{validate_query, QueryResult, SearchStrategy};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::store::{IndexStore, ScoredDocument};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Embeds the query and returns the `k` nearest chunks.
#[derive(Clone)]
pub struct SemanticSearch {
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl SemanticSearch {
    pub fn new(store: Arc<dyn IndexStore>, embedder: Arc<dyn Embedder>, k: usize) -> Self {
        Self { store, embedder, k }
    }

    /// Raw neighbor hits with their distances, nearest first.
    #[instrument(skip(self))]
    pub async fn neighbors(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        let query = validate_query(query)?;
        let embedding = self.embedder.embed(query).await?;
        let hits = self.store.nearest_neighbors(&embedding, k).await?;
        debug!("{} neighbors for query", hits.len());
        Ok(hits)
    }
}

#[async_trait]
impl SearchStrategy for SemanticSearch {
    fn name(&self) -> &'static str {
        "semantic"
    }

    async fn search(&self, query: &str) -> Result<Vec<QueryResult>> {
        let hits = self.neighbors(query, self.k).await?;
        Ok(hits.into_iter().map(|hit| QueryResult::from(hit.document)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DaesaError;
    use crate::retrieval::testing::{doc, store_with, FailingEmbedder, FixedEmbedder};

    const QUERY: &str = "다른 사람이 이기는 걸 좋아해 봐.. 그럼 아빠도 행복할걸?";

    #[tokio::test]
    async fn test_best_match_comes_first_with_link() {
        let store = store_with(vec![
            doc("zzz999", 10.0, "오늘 점심 뭐 먹지", vec![0.0, 1.0, 0.0]),
            doc("abc123", 125.0, "다른 사람이 이기는 걸 좋아해 봐", vec![1.0, 0.0, 0.0]),
            doc("yyy888", 40.0, "이기는 게 좋아", vec![0.6, 0.8, 0.0]),
        ])
        .await;
        let embedder = Arc::new(FixedEmbedder::new(vec![0.0, 0.0, 1.0]).with(QUERY, vec![0.95, 0.05, 0.0]));

        let search = SemanticSearch::new(store, embedder, 7);
        let results = search.search(QUERY).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].video_id, "abc123");
        assert_eq!(results[0].start_time, 125.0);
        assert_eq!(
            results[0].youtube_link,
            "https://www.youtube.com/watch?v=abc123&t=125s"
        );
        assert_eq!(results[1].video_id, "yyy888");
    }

    #[tokio::test]
    async fn test_cap_is_respected() {
        let docs = (0..10)
            .map(|i| doc("v", i as f64, "x", vec![1.0, i as f32, 0.0]))
            .collect();
        let store = store_with(docs).await;
        let search = SemanticSearch::new(store, Arc::new(FixedEmbedder::new(vec![1.0, 0.0, 0.0])), 7);

        let results = search.search("anything").await.unwrap();
        assert_eq!(results.len(), 7);
        assert_eq!(results[0].start_time, 0.0);
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty_list() {
        let store = store_with(Vec::new()).await;
        let search = SemanticSearch::new(store, Arc::new(FixedEmbedder::new(vec![1.0, 0.0])), 7);
        assert!(search.search("아무거나").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let store = store_with(Vec::new()).await;
        let search = SemanticSearch::new(store, Arc::new(FailingEmbedder), 7);
        let err = search.search("query").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let store = store_with(Vec::new()).await;
        let search = SemanticSearch::new(store, Arc::new(FailingEmbedder), 7);
        assert!(matches!(
            search.search("   ").await,
            Err(DaesaError::MalformedQuery(_))
        ));
    }
}
