//! Daesa - YouTube transcript line search
//!
//! Finds where in a channel's videos a half-remembered line was spoken and
//! links straight to that moment.
//!
//! # Overview
//!
//! Daesa allows you to:
//! - Segment caption transcripts into overlapping, time-stamped chunks
//! - Index the chunks with embeddings in an index store
//! - Search them semantically, by keyword ranking, or by exact terms
//! - Pick the single video that best matches a query
//! - Serve all of the above over HTTP, with slow searches on a retrying task queue
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `transcript` - Caption lines and transcript files
//! - `segmenter` - Grouping and length-bounded splitting
//! - `embedding` - Embedding generation
//! - `store` - Index store abstraction and its SQLite/in-memory clients
//! - `retrieval` - Semantic, lexical and exact strategies, best-video ranking
//! - `tasks` - Worker-pool task queue with retries and time limits
//! - `ingest` - Loading transcript files into the store
//! - `history` - Audit records of served searches
//! - `service` - The assembled search service
//!
//! # Example
//!
//! ```rust,no_run
//! use daesa::config::Settings;
//! use daesa::service::{SearchMode, SearchService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let service = SearchService::from_settings(&settings)?;
//!
//!     for result in service.search(SearchMode::Semantic, "그럼 아빠도 행복할걸?").await? {
//!         println!("{} {}", result.video_id, result.youtube_link);
//!     }
//!     service.close()?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod history;
pub mod ingest;
pub mod openai;
pub mod retrieval;
pub mod segmenter;
pub mod service;
pub mod store;
pub mod tasks;
pub mod transcript;

pub use error::{DaesaError, Result};
