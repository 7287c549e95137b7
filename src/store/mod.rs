//! Index store abstraction for Daesa.
//!
//! The index store persists chunk documents with their embeddings and answers
//! three kinds of reads: nearest neighbors by embedding distance, ranked
//! keyword search over `content`, and exact multi-term containment filters.
//! All reads are independent; writes happen only during ingestion.

mod memory;
mod sqlite;

pub use memory::MemoryIndexStore;
pub use sqlite::SqliteIndexStore;

use crate::config::Settings;
use crate::error::{DaesaError, Result};
use crate::segmenter::Chunk;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// A chunk as stored in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID.
    pub id: Uuid,
    /// Text content of this chunk.
    pub content: String,
    /// Channel the video belongs to.
    pub channel_id: String,
    /// Video ID this document belongs to.
    pub video_id: String,
    /// Start time of the chunk's first line (seconds).
    pub start: f64,
    /// Start time of the chunk's last line (seconds).
    pub end: f64,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this document was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl Document {
    /// Create a document from a chunk and its embedding.
    pub fn from_chunk(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: chunk.content,
            channel_id: chunk.channel_id,
            video_id: chunk.video_id,
            start: chunk.start,
            end: chunk.end,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A nearest-neighbor hit.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    /// The matched document.
    pub document: Document,
    /// Cosine distance to the query (lower is more similar).
    pub distance: f32,
}

/// Trait for index store clients.
///
/// A client must be closed exactly once when its owner is done with it;
/// use [`StoreGuard`] to tie that to scope exit.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Bulk insert or replace documents.
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize>;

    /// The `k` documents closest to the query embedding, nearest first.
    async fn nearest_neighbors(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredDocument>>;

    /// The `k` best keyword matches over `content`, best first.
    async fn lexical_search(&self, query: &str, k: usize) -> Result<Vec<Document>>;

    /// Up to `limit` documents whose `content` contains every term, in
    /// document order. An empty term list matches nothing.
    async fn filter_contains_all(&self, terms: &[String], limit: usize) -> Result<Vec<Document>>;

    /// Delete documents by video ID.
    async fn delete_by_video_id(&self, video_id: &str) -> Result<usize>;

    /// Get total document count.
    async fn document_count(&self) -> Result<usize>;

    /// Whether the client can currently serve queries.
    async fn is_ready(&self) -> bool;

    /// Release the client. Later calls on it fail with `StoreClosed`.
    fn close(&self) -> Result<()>;
}

/// Owns an open store client and closes it exactly once: on an explicit
/// [`StoreGuard::close`], or when dropped on every other exit path.
pub struct StoreGuard {
    store: Arc<dyn IndexStore>,
    closed: AtomicBool,
}

impl StoreGuard {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self {
            store,
            closed: AtomicBool::new(false),
        }
    }

    /// A shared handle for components that query the store while the guard lives.
    pub fn handle(&self) -> Arc<dyn IndexStore> {
        self.store.clone()
    }

    /// Close the client now. Later calls, and the drop, are no-ops.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.store.close()?;
        debug!("Index store client closed");
        Ok(())
    }
}

impl Deref for StoreGuard {
    type Target = dyn IndexStore;

    fn deref(&self) -> &Self::Target {
        self.store.as_ref()
    }
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close index store client: {}", e);
        }
    }
}

/// Open the configured index store.
pub fn open_store(settings: &Settings) -> Result<StoreGuard> {
    let store: Arc<dyn IndexStore> = match settings.index_store.provider.as_str() {
        "sqlite" => Arc::new(SqliteIndexStore::open(&settings.sqlite_path())?),
        "memory" => Arc::new(MemoryIndexStore::new()),
        other => {
            return Err(DaesaError::Config(format!(
                "Unknown index store provider: {}",
                other
            )))
        }
    };
    Ok(StoreGuard::new(store))
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance, the ranking metric of nearest-neighbor search.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Rank documents by distance to the query, keeping store order among ties.
pub(crate) fn rank_by_distance<I>(docs: I, query_embedding: &[f32], k: usize) -> Vec<ScoredDocument>
where
    I: IntoIterator<Item = Document>,
{
    let mut scored: Vec<ScoredDocument> = docs
        .into_iter()
        .map(|document| {
            let distance = cosine_distance(query_embedding, &document.embedding);
            ScoredDocument { document, distance }
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}
