//! The assembled search service shared by the CLI and the HTTP server.
//!
//! Owns the index store client for its whole life, the retrieval strategies
//! built on it, the task queue for semantic queries, and the audit history.

use crate::config::Settings;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{DaesaError, Result};
use crate::history::SearchHistory;
use crate::retrieval::{
    BestVideoFinder, ExactMatchSearch, LexicalSearch, QueryResult, SearchStrategy, SemanticSearch,
};
use crate::store::{open_store, StoreGuard};
use crate::tasks::{BoundedSearch, TaskQueue};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Which retrieval strategy serves a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Embedding nearest neighbors, run on the task queue.
    Semantic,
    /// Keyword ranking.
    Lexical,
    /// Every query term must appear verbatim.
    Exact,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Semantic => "vector",
            SearchMode::Lexical => "bm25",
            SearchMode::Exact => "exact",
        }
    }
}

impl FromStr for SearchMode {
    type Err = DaesaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "vector" | "semantic" => Ok(SearchMode::Semantic),
            "bm25" | "lexical" => Ok(SearchMode::Lexical),
            "exact" => Ok(SearchMode::Exact),
            other => Err(DaesaError::MalformedQuery(format!(
                "unknown search type: {}",
                other
            ))),
        }
    }
}

/// Search entry point over one open index store.
pub struct SearchService {
    store: StoreGuard,
    lexical: LexicalSearch,
    exact: ExactMatchSearch,
    best_video: BestVideoFinder,
    direct: BoundedSearch,
    queue: TaskQueue,
    wait_timeout: Duration,
    history: Option<SearchHistory>,
}

impl SearchService {
    /// Open the configured store and embedding backend.
    ///
    /// Must be called inside a Tokio runtime, since it starts the queue workers.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store = open_store(settings)?;
        let embedder = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);
        Ok(Self::new(store, embedder, settings))
    }

    /// Build the service over an already opened store.
    pub fn new(store: StoreGuard, embedder: Arc<dyn Embedder>, settings: &Settings) -> Self {
        let retrieval = &settings.retrieval;
        let semantic = SemanticSearch::new(store.handle(), embedder, retrieval.semantic_k);
        let executor: Arc<dyn SearchStrategy> = Arc::new(semantic.clone());

        Self {
            lexical: LexicalSearch::new(store.handle(), retrieval.lexical_k),
            exact: ExactMatchSearch::new(store.handle(), retrieval.exact_limit),
            best_video: BestVideoFinder::new(semantic, retrieval.best_video_k),
            direct: BoundedSearch::new(executor.clone(), settings.tasks.direct_concurrency),
            queue: TaskQueue::start(executor, &settings.tasks),
            wait_timeout: settings.tasks.wait_timeout(),
            history: None,
            store,
        }
    }

    /// Audit every served, non-empty result set into `history`.
    pub fn with_history(mut self, history: SearchHistory) -> Self {
        self.history = Some(history);
        self
    }

    /// Run a query with the given strategy. Semantic queries go through the
    /// task queue and wait at most the configured bound.
    pub async fn search(&self, mode: SearchMode, query: &str) -> Result<Vec<QueryResult>> {
        let started = Instant::now();
        let results = match mode {
            SearchMode::Semantic => self.queue.run(query, self.wait_timeout).await,
            SearchMode::Lexical => self.lexical.search(query).await,
            SearchMode::Exact => self.exact.search(query).await,
        }?;
        info!(
            "{} search returned {} results in {:.2}s",
            mode.as_str(),
            results.len(),
            started.elapsed().as_secs_f64()
        );
        self.audit(query, &results);
        Ok(results)
    }

    /// Run a semantic query in the caller's task, without the queue.
    pub async fn search_direct(&self, query: &str) -> Result<Vec<QueryResult>> {
        let started = Instant::now();
        let results = self.direct.search(query).await?;
        info!(
            "direct vector search returned {} results in {:.2}s",
            results.len(),
            started.elapsed().as_secs_f64()
        );
        self.audit(query, &results);
        Ok(results)
    }

    /// The video whose chunks are on average closest to the query.
    pub async fn best_video(&self, query: &str) -> Option<String> {
        self.best_video.find_best_video(query).await
    }

    pub fn best_video_finder(&self) -> &BestVideoFinder {
        &self.best_video
    }

    pub async fn is_ready(&self) -> bool {
        self.store.is_ready().await
    }

    /// Stop the workers and release the store client.
    pub fn close(&self) -> Result<()> {
        self.queue.shutdown();
        self.store.close()
    }

    fn audit(&self, query: &str, results: &[QueryResult]) {
        let Some(history) = &self.history else {
            return;
        };
        let started = Instant::now();
        match history.record_results(query, results) {
            Ok(Some(path)) => info!(
                "Saved search history to {:?} in {:.3}s",
                path,
                started.elapsed().as_secs_f64()
            ),
            Ok(None) => {}
            // Auditing never fails a search that already succeeded.
            Err(e) => warn!("Failed to save search history: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::testing::{doc, CountingStore, FixedEmbedder};
    use crate::store::{IndexStore, MemoryIndexStore};

    async fn service(history: Option<&std::path::Path>) -> (SearchService, Arc<dyn IndexStore>) {
        let store: Arc<dyn IndexStore> = Arc::new(MemoryIndexStore::new());
        store
            .upsert_batch(&[
                doc("abc123", 125.0, "다른 사람이 이기는 걸 좋아해 봐", vec![1.0, 0.0, 0.0]),
                doc("def456", 30.0, "뇌이징 어메이징 정말 대단해", vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        let embedder = Arc::new(
            FixedEmbedder::new(vec![0.0, 0.0, 1.0])
                .with("다른 사람이 이기는 걸 좋아해 봐", vec![0.95, 0.05, 0.0]),
        );
        let mut service = SearchService::new(StoreGuard::new(store.clone()), embedder, &Settings::default());
        if let Some(dir) = history {
            service = service.with_history(SearchHistory::new(dir));
        }
        (service, store)
    }

    #[test]
    fn test_parse_search_mode() {
        assert_eq!("vector".parse::<SearchMode>().unwrap(), SearchMode::Semantic);
        assert_eq!("BM25".parse::<SearchMode>().unwrap(), SearchMode::Lexical);
        assert_eq!("exact".parse::<SearchMode>().unwrap(), SearchMode::Exact);
        assert!(matches!(
            "fuzzy".parse::<SearchMode>(),
            Err(DaesaError::MalformedQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_semantic_search_through_queue() {
        let (service, _) = service(None).await;
        let results = service
            .search(SearchMode::Semantic, "다른 사람이 이기는 걸 좋아해 봐")
            .await
            .unwrap();

        assert_eq!(results[0].video_id, "abc123");
        assert_eq!(
            results[0].youtube_link,
            "https://www.youtube.com/watch?v=abc123&t=125s"
        );
    }

    #[tokio::test]
    async fn test_exact_search_and_audit() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service(Some(dir.path())).await;

        let results = service.search(SearchMode::Exact, "뇌이징 어메이징").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].video_id, "def456");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let none = service.search(SearchMode::Exact, "없는 말").await.unwrap();
        assert!(none.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_direct_search_and_best_video() {
        let (service, _) = service(None).await;
        let query = "다른 사람이 이기는 걸 좋아해 봐";

        let results = service.search_direct(query).await.unwrap();
        assert_eq!(results[0].video_id, "abc123");
        assert_eq!(service.best_video(query).await.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_client_closed_once_across_close_and_drop() {
        let store = Arc::new(CountingStore::default());
        let embedder = Arc::new(FixedEmbedder::new(vec![1.0, 0.0, 0.0]));
        let service = SearchService::new(StoreGuard::new(store.clone()), embedder, &Settings::default());

        service.close().unwrap();
        drop(service);
        assert_eq!(store.closes(), 1);
    }

    #[tokio::test]
    async fn test_client_closed_on_drop_without_close() {
        let store = Arc::new(CountingStore::default());
        let embedder = Arc::new(FixedEmbedder::new(vec![1.0, 0.0, 0.0]));
        drop(SearchService::new(StoreGuard::new(store.clone()), embedder, &Settings::default()));
        assert_eq!(store.closes(), 1);
    }

    #[tokio::test]
    async fn test_close_releases_store() {
        let (service, store) = service(None).await;
        assert!(service.is_ready().await);

        service.close().unwrap();
        assert!(!store.is_ready().await);
        assert!(matches!(
            service.search(SearchMode::Lexical, "게임").await,
            Err(DaesaError::StoreClosed)
        ));
    }
}
