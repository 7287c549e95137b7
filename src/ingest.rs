//! Loading transcript files into the index store.
//!
//! The ingestor scans the transcripts directory for `<video_id>.json` files not
//! yet listed in the upload manifest, segments and embeds each one, and upserts
//! the chunks in batches. A file is added to the manifest only after every
//! batch for it succeeded. A failing file is counted and skipped; the run goes
//! on with the next one.

use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::{DaesaError, Result};
use crate::segmenter::{segment_transcript, SegmentingConfig, VideoRef};
use crate::store::{Document, IndexStore};
use crate::transcript::read_transcript_file;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// File names already uploaded, as stored in `uploaded_files.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadManifest {
    pub files: Vec<String>,
}

impl UploadManifest {
    /// Load a manifest. A missing file is an empty manifest.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.files.iter().any(|f| f == file_name)
    }
}

/// Totals of one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// What happened to one transcript file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub file_name: String,
    /// Chunks stored, or the reason the file was skipped.
    pub result: std::result::Result<usize, String>,
}

/// Segments, embeds and stores transcript files.
pub struct Ingestor {
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn Embedder>,
    segmenting: SegmentingConfig,
    channel_id: String,
    batch_size: usize,
    transcripts_dir: PathBuf,
    manifest_path: PathBuf,
    video_id_pattern: Regex,
}

impl Ingestor {
    pub fn new(store: Arc<dyn IndexStore>, embedder: Arc<dyn Embedder>, settings: &Settings) -> Result<Self> {
        let video_id_pattern = Regex::new(r"^[A-Za-z0-9_-]+$")
            .map_err(|e| DaesaError::Config(format!("Invalid video id pattern: {}", e)))?;

        Ok(Self {
            store,
            embedder,
            segmenting: SegmentingConfig::from(&settings.segmenting),
            channel_id: settings.ingest.channel_id.clone(),
            batch_size: settings.ingest.batch_size.max(1),
            transcripts_dir: settings.transcripts_dir(),
            manifest_path: settings.data_dir().join("uploaded_files.json"),
            video_id_pattern,
        })
    }

    /// Read transcripts from `dir` instead of the configured directory.
    pub fn with_transcripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.transcripts_dir = dir.into();
        self
    }

    /// Keep the upload manifest at `path`.
    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Transcript files not yet in the manifest, sorted by name.
    pub fn pending_files(&self) -> Result<Vec<PathBuf>> {
        if !self.transcripts_dir.exists() {
            return Err(DaesaError::InvalidInput(format!(
                "Transcripts directory not found: {:?}",
                self.transcripts_dir
            )));
        }

        let manifest = UploadManifest::load(&self.manifest_path)?;
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.transcripts_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(".json") && !manifest.contains(name) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Ingest every pending file.
    pub async fn run(&self) -> Result<IngestReport> {
        self.run_with(|_| {}).await
    }

    /// Ingest every pending file, reporting each file as it finishes.
    #[instrument(skip(self, on_file))]
    pub async fn run_with<F>(&self, mut on_file: F) -> Result<IngestReport>
    where
        F: FnMut(&FileOutcome),
    {
        let files = self.pending_files()?;
        let mut report = IngestReport::default();
        if files.is_empty() {
            info!("All transcripts are already uploaded");
            return Ok(report);
        }

        info!("Ingesting {} transcript files", files.len());
        let mut manifest = UploadManifest::load(&self.manifest_path)?;

        for path in files {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            let result = match self.ingest_file(&path).await {
                Ok(count) => {
                    manifest.files.push(file_name.clone());
                    manifest.save(&self.manifest_path).map(|_| count)
                }
                Err(e) => Err(e),
            };

            report.processed += 1;
            let result = match result {
                Ok(count) => {
                    report.succeeded += 1;
                    info!("{}: stored {} chunks", file_name, count);
                    Ok(count)
                }
                Err(e) => {
                    report.failed += 1;
                    warn!("{}: skipped: {}", file_name, e);
                    Err(e.to_string())
                }
            };
            on_file(&FileOutcome { file_name, result });
        }

        info!(
            "Ingestion finished: {} processed, {} succeeded, {} failed",
            report.processed, report.succeeded, report.failed
        );
        Ok(report)
    }

    /// Segment, embed and store one transcript file. Returns the chunks stored.
    ///
    /// Chunks previously stored for the same video are replaced.
    pub async fn ingest_file(&self, path: &Path) -> Result<usize> {
        let video_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| self.video_id_pattern.is_match(s))
            .ok_or_else(|| DaesaError::InvalidInput(format!("No video id in file name {:?}", path)))?;

        let lines = read_transcript_file(path)?
            .ok_or_else(|| DaesaError::InvalidInput(format!("Transcript not found: {:?}", path)))?;

        let video = VideoRef::new(self.channel_id.clone(), video_id);
        let chunks = segment_transcript(&lines, &video, &self.segmenting);
        if chunks.is_empty() {
            return Err(DaesaError::InvalidInput(format!(
                "Transcript {} produced no chunks",
                video_id
            )));
        }
        debug!("{}: {} lines -> {} chunks", video_id, lines.len(), chunks.len());

        self.store.delete_by_video_id(video_id).await?;

        let mut stored = 0;
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;

            let documents: Vec<Document> = batch
                .iter()
                .cloned()
                .zip(embeddings)
                .map(|(chunk, embedding)| Document::from_chunk(chunk, embedding))
                .collect();
            stored += self.store.upsert_batch(&documents).await?;
            debug!("{}: uploaded batch of {}", video_id, documents.len());
        }

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::testing::{FailingEmbedder, FixedEmbedder};
    use crate::store::MemoryIndexStore;
    use crate::transcript::{save_transcript, TranscriptLine};

    fn transcript(n: usize) -> Vec<TranscriptLine> {
        (0..n)
            .map(|i| TranscriptLine::new(format!("문장 {}", i), i as f64 * 3.0))
            .collect()
    }

    fn ingestor(
        store: Arc<dyn IndexStore>,
        embedder: Arc<dyn Embedder>,
        dir: &Path,
    ) -> Ingestor {
        let mut settings = Settings::default();
        settings.ingest.channel_id = "UCUj6rrhMTR9pipbAWBAMvUQ".to_string();
        settings.ingest.batch_size = 2;
        Ingestor::new(store, embedder, &settings)
            .unwrap()
            .with_transcripts_dir(dir.join("transcripts"))
            .with_manifest_path(dir.join("uploaded_files.json"))
    }

    #[tokio::test]
    async fn test_ingests_pending_files_once() {
        let dir = tempfile::tempdir().unwrap();
        let transcripts = dir.path().join("transcripts");
        save_transcript(&transcripts, "abc123", &transcript(25)).unwrap();
        save_transcript(&transcripts, "def456", &transcript(5)).unwrap();

        let store: Arc<dyn IndexStore> = Arc::new(MemoryIndexStore::new());
        let embedder = Arc::new(FixedEmbedder::new(vec![1.0, 0.0, 0.0]));
        let ingestor = ingestor(store.clone(), embedder, dir.path());

        let report = ingestor.run().await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                processed: 2,
                succeeded: 2,
                failed: 0
            }
        );
        // 25 lines in groups of 10 -> 3 chunks, plus 1 chunk for 5 lines.
        assert_eq!(store.document_count().await.unwrap(), 4);

        let manifest = UploadManifest::load(ingestor.manifest_path()).unwrap();
        assert_eq!(manifest.files, vec!["abc123.json", "def456.json"]);

        let rerun = ingestor.run().await.unwrap();
        assert_eq!(rerun.processed, 0);
        assert_eq!(store.document_count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_bad_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let transcripts = dir.path().join("transcripts");
        save_transcript(&transcripts, "abc123", &transcript(3)).unwrap();
        std::fs::write(transcripts.join("broken.json"), "not json").unwrap();

        let store: Arc<dyn IndexStore> = Arc::new(MemoryIndexStore::new());
        let embedder = Arc::new(FixedEmbedder::new(vec![1.0, 0.0]));
        let ingestor = ingestor(store.clone(), embedder, dir.path());

        let mut seen = Vec::new();
        let report = ingestor
            .run_with(|outcome| seen.push((outcome.file_name.clone(), outcome.result.is_ok())))
            .await
            .unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(
            seen,
            vec![("abc123.json".to_string(), true), ("broken.json".to_string(), false)]
        );
        let manifest = UploadManifest::load(ingestor.manifest_path()).unwrap();
        assert_eq!(manifest.files, vec!["abc123.json"]);
    }

    #[tokio::test]
    async fn test_embedding_failure_leaves_file_pending() {
        let dir = tempfile::tempdir().unwrap();
        save_transcript(&dir.path().join("transcripts"), "abc123", &transcript(3)).unwrap();

        let store: Arc<dyn IndexStore> = Arc::new(MemoryIndexStore::new());
        let ingestor = ingestor(store, Arc::new(FailingEmbedder), dir.path());

        let report = ingestor.run().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(ingestor.pending_files().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reingest_replaces_video_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let transcripts = dir.path().join("transcripts");
        let path = save_transcript(&transcripts, "abc123", &transcript(20)).unwrap();

        let store: Arc<dyn IndexStore> = Arc::new(MemoryIndexStore::new());
        let embedder = Arc::new(FixedEmbedder::new(vec![1.0]));
        let ingestor = ingestor(store.clone(), embedder, dir.path());

        assert_eq!(ingestor.ingest_file(&path).await.unwrap(), 2);
        assert_eq!(ingestor.ingest_file(&path).await.unwrap(), 2);
        assert_eq!(store.document_count().await.unwrap(), 2);
    }

    #[test]
    fn test_missing_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = UploadManifest::load(&dir.path().join("uploaded_files.json")).unwrap();
        assert!(manifest.files.is_empty());
    }
}
