//! Retrieval strategies over the index store.
//!
//! Three independent strategies map a free-text query to time-stamped video
//! links: semantic nearest neighbors, keyword ranking, and exact multi-term
//! containment. A fourth component ranks whole videos by their mean distance
//! to the query.

mod best_video;
mod exact;
mod lexical;
mod semantic;

#[cfg(test)]
pub(crate) mod testing;

pub use best_video::{BestVideoFinder, VideoScore};
pub use exact::ExactMatchSearch;
pub use lexical::LexicalSearch;
pub use semantic::SemanticSearch;

use crate::error::{DaesaError, Result};
use crate::store::Document;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const WATCH_URL: &str = "https://www.youtube.com/watch";

/// One retrieved transcript snippet with a link to the moment it is spoken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub video_id: String,
    /// Start of the chunk in seconds.
    pub start_time: f64,
    pub content: String,
    /// Watch URL with `t=` set to the truncated start time.
    pub youtube_link: String,
}

impl From<Document> for QueryResult {
    fn from(doc: Document) -> Self {
        let youtube_link = youtube_link(&doc.video_id, doc.start);
        Self {
            video_id: doc.video_id,
            start_time: doc.start,
            content: doc.content,
            youtube_link,
        }
    }
}

/// Watch URL that starts playback at `start_time`, truncated to whole seconds.
pub fn youtube_link(video_id: &str, start_time: f64) -> String {
    format!("{}?v={}&t={}s", WATCH_URL, video_id, start_time.trunc() as i64)
}

/// Trim a query and reject it if nothing is left.
pub fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(DaesaError::MalformedQuery("query is empty".to_string()));
    }
    Ok(trimmed)
}

/// A stateless query handler. An empty result list means "no matches" and is
/// not an error.
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Run the query, best results first.
    async fn search(&self, query: &str) -> Result<Vec<QueryResult>>;
}
