//! In-memory index store implementation.
//!
//! Useful for testing and small datasets. Documents keep insertion order,
//! which is the order ties and filter results come back in.

use super::{rank_by_distance, Document, IndexStore, ScoredDocument};
use crate::error::{DaesaError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

/// In-memory index store.
pub struct MemoryIndexStore {
    documents: RwLock<Vec<Document>>,
    closed: AtomicBool,
}

impl MemoryIndexStore {
    /// Create a new in-memory index store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Document>>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DaesaError::StoreClosed);
        }
        self.documents
            .read()
            .map_err(|e| DaesaError::IndexStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Document>>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DaesaError::StoreClosed);
        }
        self.documents
            .write()
            .map_err(|e| DaesaError::IndexStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryIndexStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased alphanumeric runs.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize> {
        let mut store = self.write()?;
        for doc in docs {
            match store.iter_mut().find(|d| d.id == doc.id) {
                Some(existing) => *existing = doc.clone(),
                None => store.push(doc.clone()),
            }
        }
        Ok(docs.len())
    }

    async fn nearest_neighbors(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let docs = self.read()?;
        Ok(rank_by_distance(docs.iter().cloned(), query_embedding, k))
    }

    async fn lexical_search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        let docs = self.read()?;
        let query_terms = tokenize(query);
        if query_terms.is_empty() || docs.is_empty() {
            return Ok(Vec::new());
        }

        let tokenized: Vec<Vec<String>> = docs.iter().map(|d| tokenize(&d.content)).collect();
        let n = tokenized.len() as f64;
        let avg_len = tokenized.iter().map(Vec::len).sum::<usize>() as f64 / n;

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for term in &query_terms {
            let df = tokenized
                .iter()
                .filter(|tokens| tokens.iter().any(|t| t == term))
                .count();
            doc_freq.insert(term.as_str(), df);
        }

        let mut scored: Vec<(f64, &Document)> = tokenized
            .iter()
            .zip(docs.iter())
            .filter_map(|(tokens, doc)| {
                let len = tokens.len() as f64;
                let score: f64 = query_terms
                    .iter()
                    .map(|term| {
                        let tf = tokens.iter().filter(|t| *t == term).count() as f64;
                        if tf == 0.0 {
                            return 0.0;
                        }
                        let df = doc_freq.get(term.as_str()).copied().unwrap_or(0) as f64;
                        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                        let norm = if avg_len > 0.0 { len / avg_len } else { 1.0 };
                        idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * norm))
                    })
                    .sum();
                (score > 0.0).then_some((score, doc))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(k).map(|(_, doc)| doc.clone()).collect())
    }

    async fn filter_contains_all(&self, terms: &[String], limit: usize) -> Result<Vec<Document>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let docs = self.read()?;
        Ok(docs
            .iter()
            .filter(|d| terms.iter().all(|term| d.content.contains(term.as_str())))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_by_video_id(&self, video_id: &str) -> Result<usize> {
        let mut docs = self.write()?;
        let initial_len = docs.len();
        docs.retain(|doc| doc.video_id != video_id);
        Ok(initial_len - docs.len())
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    async fn is_ready(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
