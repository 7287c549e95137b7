//! Configuration settings for Daesa.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub segmenting: SegmentingSettings,
    pub index_store: IndexStoreSettings,
    pub retrieval: RetrievalSettings,
    pub tasks: TaskSettings,
    pub ingest: IngestSettings,
    pub server: ServerSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.daesa".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use. Documents and queries must share it.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// L2-normalize every embedding before it is stored or searched.
    pub normalize: bool,
    /// Request timeout for the embedding API.
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1024,
            normalize: true,
            timeout_secs: 60,
        }
    }
}

/// Transcript segmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentingSettings {
    /// Number of caption lines per group.
    pub group_size: usize,
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of one oversized group.
    pub chunk_overlap: usize,
}

impl Default for SegmentingSettings {
    fn default() -> Self {
        Self {
            group_size: 10,
            chunk_size: 3000,
            chunk_overlap: 300,
        }
    }
}

/// Index store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexStoreSettings {
    /// Index store provider (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for IndexStoreSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.daesa/index.db".to_string(),
        }
    }
}

/// Result caps for each retrieval strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub semantic_k: usize,
    pub lexical_k: usize,
    pub exact_limit: usize,
    /// Neighbor count used when ranking whole videos ("effectively all").
    pub best_video_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            semantic_k: 7,
            lexical_k: 7,
            exact_limit: 10,
            best_video_k: 1000,
        }
    }
}

/// Async task layer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    /// Number of queue workers.
    pub workers: usize,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay_secs: u64,
    /// Hard wall-clock limit for one attempt.
    pub time_limit_secs: u64,
    /// How long a caller waits for a task result.
    pub wait_timeout_secs: u64,
    /// How long an unclaimed finished task is kept.
    pub result_ttl_secs: u64,
    /// How many times a task lost by a crashed worker is redelivered.
    pub max_redeliveries: u32,
    /// Concurrent semantic searches allowed on the direct (unqueued) path.
    pub direct_concurrency: usize,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            max_retries: 3,
            retry_delay_secs: 5,
            time_limit_secs: 60,
            wait_timeout_secs: 50,
            result_ttl_secs: 3600,
            max_redeliveries: 3,
            direct_concurrency: 4,
        }
    }
}

impl TaskSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }
}

/// Ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Channel the ingested transcripts belong to.
    pub channel_id: String,
    /// Directory holding `<video_id>.json` transcript files.
    pub transcripts_dir: String,
    /// Documents per upload batch.
    pub batch_size: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            channel_id: String::new(),
            transcripts_dir: "~/.daesa/transcripts".to_string(),
            batch_size: 100,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Directory receiving one audit record per served search.
    pub history_dir: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8200,
            history_dir: "~/.daesa/search_history".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Reject combinations the segmenter and task layer cannot work with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::DaesaError;

        if self.segmenting.group_size == 0 {
            return Err(DaesaError::Config("segmenting.group_size must be at least 1".to_string()));
        }
        if self.segmenting.chunk_overlap >= self.segmenting.chunk_size {
            return Err(DaesaError::Config(format!(
                "segmenting.chunk_overlap ({}) must be smaller than segmenting.chunk_size ({})",
                self.segmenting.chunk_overlap, self.segmenting.chunk_size
            )));
        }
        if self.tasks.workers == 0 || self.tasks.direct_concurrency == 0 {
            return Err(DaesaError::Config(
                "tasks.workers and tasks.direct_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::DaesaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("daesa")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.index_store.sqlite_path)
    }

    /// Get the expanded transcripts directory.
    pub fn transcripts_dir(&self) -> PathBuf {
        Self::expand_path(&self.ingest.transcripts_dir)
    }

    /// Get the expanded search history directory.
    pub fn history_dir(&self) -> PathBuf {
        Self::expand_path(&self.server.history_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_pipeline() {
        let settings = Settings::default();
        assert_eq!(settings.segmenting.group_size, 10);
        assert_eq!(settings.segmenting.chunk_size, 3000);
        assert_eq!(settings.segmenting.chunk_overlap, 300);
        assert_eq!(settings.retrieval.semantic_k, 7);
        assert_eq!(settings.retrieval.exact_limit, 10);
        assert_eq!(settings.tasks.max_retries, 3);
        assert_eq!(settings.tasks.wait_timeout(), Duration::from_secs(50));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [tasks]
            workers = 8

            [server]
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(settings.tasks.workers, 8);
        assert_eq!(settings.tasks.max_retries, 3);
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.segmenting.chunk_size, 3000);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut settings = Settings::default();
        settings.segmenting.chunk_overlap = 3000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.ingest.channel_id = "UCUj6rrhMTR9pipbAWBAMvUQ".to_string();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.ingest.channel_id, "UCUj6rrhMTR9pipbAWBAMvUQ");
    }
}
