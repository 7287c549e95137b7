//! SQLite-based index store implementation.
//!
//! Nearest neighbors are computed in Rust over all stored embeddings, keyword
//! ranking uses an FTS5 index with its built-in BM25, and containment
//! filters use `instr`. For large corpora a dedicated vector database is the
//! better fit; this backend keeps a single-file index for local use.

use super::{rank_by_distance, Document, IndexStore, ScoredDocument};
use crate::error::{DaesaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS chunks (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        content TEXT NOT NULL,
        channel_id TEXT NOT NULL,
        video_id TEXT NOT NULL,
        start_time REAL NOT NULL,
        end_time REAL NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_chunks_video_id ON chunks(video_id);

    CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(content);
"#;

const COLUMNS: &str = "id, content, channel_id, video_id, start_time, end_time, embedding, indexed_at";

/// SQLite-based index store.
pub struct SqliteIndexStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteIndexStore {
    /// Open (or create) an index store at `path`.
    #[instrument(skip_all)]
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Opened SQLite index store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Create an in-memory SQLite index store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|e| DaesaError::IndexStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
        let id_str: String = row.get(0)?;
        let embedding_bytes: Vec<u8> = row.get(6)?;
        let indexed_at_str: String = row.get(7)?;

        Ok(Document {
            id: uuid::Uuid::parse_str(&id_str).unwrap_or_default(),
            content: row.get(1)?,
            channel_id: row.get(2)?,
            video_id: row.get(3)?,
            start: row.get(4)?,
            end: row.get(5)?,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    /// Quote each whitespace-separated term as an FTS5 string and OR them,
    /// so punctuation in free-text queries never reaches the query parser.
    fn fts_query(query: &str) -> Option<String> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
            .collect();
        (!terms.is_empty()).then(|| terms.join(" OR "))
    }
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    #[instrument(skip(self, docs), fields(count = docs.len()))]
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(DaesaError::StoreClosed)?;

        let tx = conn.unchecked_transaction()?;

        for doc in docs {
            tx.execute(
                "DELETE FROM chunks_fts WHERE rowid IN (SELECT seq FROM chunks WHERE id = ?1)",
                params![doc.id.to_string()],
            )?;
            tx.execute(
                r#"
                INSERT OR REPLACE INTO chunks
                (id, content, channel_id, video_id, start_time, end_time, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    doc.id.to_string(),
                    doc.content,
                    doc.channel_id,
                    doc.video_id,
                    doc.start,
                    doc.end,
                    Self::embedding_to_bytes(&doc.embedding),
                    doc.indexed_at.to_rfc3339(),
                ],
            )?;
            let seq = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO chunks_fts (rowid, content) VALUES (?1, ?2)",
                params![seq, doc.content],
            )?;
        }

        tx.commit()?;
        info!("Batch upserted {} documents", docs.len());
        Ok(docs.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn nearest_neighbors(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(DaesaError::StoreClosed)?;

        let mut stmt = conn.prepare(&format!("SELECT {} FROM chunks ORDER BY seq", COLUMNS))?;
        let docs = stmt
            .query_map([], Self::row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let results = rank_by_distance(docs, query_embedding, k);
        debug!("Found {} neighbors", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn lexical_search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        let Some(match_expr) = Self::fts_query(query) else {
            return Ok(Vec::new());
        };

        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(DaesaError::StoreClosed)?;

        // FTS5 rank is BM25 where lower is better.
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM (
                SELECT rowid AS hit, rank FROM chunks_fts
                WHERE chunks_fts MATCH ?1
                ORDER BY rank
                LIMIT ?2
            ) m
            JOIN chunks c ON c.seq = m.hit
            ORDER BY m.rank
            "#,
            COLUMNS
        ))?;

        let docs = stmt
            .query_map(params![match_expr, k as i64], Self::row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!("Found {} keyword matches", docs.len());
        Ok(docs)
    }

    #[instrument(skip(self))]
    async fn filter_contains_all(&self, terms: &[String], limit: usize) -> Result<Vec<Document>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(DaesaError::StoreClosed)?;

        let conditions = (1..=terms.len())
            .map(|i| format!("instr(content, ?{}) > 0", i))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!(
            "SELECT {} FROM chunks WHERE {} ORDER BY seq LIMIT ?{}",
            COLUMNS,
            conditions,
            terms.len() + 1
        );

        let mut values: Vec<Value> = terms.iter().map(|t| Value::Text(t.clone())).collect();
        values.push(Value::Integer(limit as i64));

        let mut stmt = conn.prepare(&sql)?;
        let docs = stmt
            .query_map(params_from_iter(values), Self::row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!("Found {} documents containing all {} terms", docs.len(), terms.len());
        Ok(docs)
    }

    #[instrument(skip(self))]
    async fn delete_by_video_id(&self, video_id: &str) -> Result<usize> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(DaesaError::StoreClosed)?;

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM chunks_fts WHERE rowid IN (SELECT seq FROM chunks WHERE video_id = ?1)",
            params![video_id],
        )?;
        let deleted = tx.execute("DELETE FROM chunks WHERE video_id = ?1", params![video_id])?;
        tx.commit()?;

        info!("Deleted {} documents for video {}", deleted, video_id);
        Ok(deleted)
    }

    async fn document_count(&self) -> Result<usize> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(DaesaError::StoreClosed)?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    async fn is_ready(&self) -> bool {
        match self.lock() {
            Ok(guard) => guard
                .as_ref()
                .is_some_and(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok()),
            Err(_) => false,
        }
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.lock()?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| DaesaError::Database(e))?;
            info!("Closed SQLite index store");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::Chunk;

    fn doc(video_id: &str, content: &str, start: f64, embedding: Vec<f32>) -> Document {
        Document::from_chunk(
            Chunk {
                content: content.to_string(),
                channel_id: "chan".to_string(),
                video_id: video_id.to_string(),
                start,
                end: start + 9.0,
            },
            embedding,
        )
    }

    #[tokio::test]
    async fn test_sqlite_index_store() {
        let store = SqliteIndexStore::in_memory().unwrap();

        store
            .upsert_batch(&[
                doc("video1", "This is test content", 0.0, vec![1.0, 0.0, 0.0]),
                doc("video2", "Other words entirely", 30.0, vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();
        assert_eq!(store.document_count().await.unwrap(), 2);

        let results = store.nearest_neighbors(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.video_id, "video1");
        assert!(results[0].distance.abs() < 0.001);
        assert_eq!(results[0].document.end, 9.0);

        let deleted = store.delete_by_video_id("video1").await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.lexical_search("test", 7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lexical_search_tolerates_punctuation() {
        let store = SqliteIndexStore::in_memory().unwrap();
        store
            .upsert_batch(&[
                doc("v1", "다른 사람이 이기는 걸 좋아해 봐", 125.0, vec![]),
                doc("v2", "오늘 점심은 짜장면", 10.0, vec![]),
            ])
            .await
            .unwrap();

        let hits = store
            .lexical_search("다른 사람이 이기는 걸 좋아해 봐.. 그럼 아빠도 행복할걸?", 7)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].video_id, "v1");
    }

    #[tokio::test]
    async fn test_upsert_replaces_keyword_index_entry() {
        let store = SqliteIndexStore::in_memory().unwrap();
        let mut d = doc("v1", "first version", 0.0, vec![]);
        store.upsert_batch(&[d.clone()]).await.unwrap();

        d.content = "second version".to_string();
        store.upsert_batch(&[d]).await.unwrap();

        assert_eq!(store.document_count().await.unwrap(), 1);
        assert!(store.lexical_search("first", 7).await.unwrap().is_empty());
        assert_eq!(store.lexical_search("second", 7).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_filter_contains_all() {
        let store = SqliteIndexStore::in_memory().unwrap();
        store
            .upsert_batch(&[
                doc("v1", "뇌이징 어메이징 정말", 0.0, vec![]),
                doc("v2", "뇌이징", 0.0, vec![]),
            ])
            .await
            .unwrap();

        let terms = vec!["뇌이징".to_string(), "어메이징".to_string()];
        let hits = store.filter_contains_all(&terms, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].video_id, "v1");
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteIndexStore::open(&dir.path().join("index.db")).unwrap();
        assert!(store.is_ready().await);

        store.close().unwrap();
        store.close().unwrap();
        assert!(!store.is_ready().await);
        assert!(matches!(
            store.document_count().await,
            Err(DaesaError::StoreClosed)
        ));
    }
}
