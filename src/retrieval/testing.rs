//! Test doubles shared by the retrieval and task tests.

use crate::embedding::Embedder;
use crate::error::{DaesaError, Result};
use crate::segmenter::Chunk;
use crate::store::{Document, IndexStore, MemoryIndexStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Returns a fixed vector per known text and `fallback` for anything else.
pub struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
}

impl FixedEmbedder {
    pub fn new(fallback: Vec<f32>) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback,
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.fallback.len()
    }
}

/// Always fails, like an unreachable embedding backend.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(DaesaError::Embedding("connection refused".to_string()))
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(DaesaError::Embedding("connection refused".to_string()))
    }

    fn dimensions(&self) -> usize {
        3
    }
}

pub fn doc(video_id: &str, start: f64, content: &str, embedding: Vec<f32>) -> Document {
    Document::from_chunk(
        Chunk {
            content: content.to_string(),
            channel_id: "UCUj6rrhMTR9pipbAWBAMvUQ".to_string(),
            video_id: video_id.to_string(),
            start,
            end: start + 20.0,
        },
        embedding,
    )
}

pub async fn store_with(docs: Vec<Document>) -> Arc<dyn IndexStore> {
    let store = MemoryIndexStore::new();
    store.upsert_batch(&docs).await.unwrap();
    Arc::new(store)
}

/// An in-memory store that counts how often its client is closed.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryIndexStore,
    closes: std::sync::atomic::AtomicUsize,
}

impl CountingStore {
    pub fn closes(&self) -> usize {
        self.closes.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexStore for CountingStore {
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize> {
        self.inner.upsert_batch(docs).await
    }

    async fn nearest_neighbors(&self, query_embedding: &[f32], k: usize) -> Result<Vec<crate::store::ScoredDocument>> {
        self.inner.nearest_neighbors(query_embedding, k).await
    }

    async fn lexical_search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        self.inner.lexical_search(query, k).await
    }

    async fn filter_contains_all(&self, terms: &[String], limit: usize) -> Result<Vec<Document>> {
        self.inner.filter_contains_all(terms, limit).await
    }

    async fn delete_by_video_id(&self, video_id: &str) -> Result<usize> {
        self.inner.delete_by_video_id(video_id).await
    }

    async fn document_count(&self) -> Result<usize> {
        self.inner.document_count().await
    }

    async fn is_ready(&self) -> bool {
        self.inner.is_ready().await
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.inner.close()
    }
}
