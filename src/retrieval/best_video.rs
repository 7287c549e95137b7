//! Whole-video ranking by mean neighbor distance.

use super::SemanticSearch;
use crate::error::Result;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// Mean distance of one video's chunks to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoScore {
    pub video_id: String,
    /// Arithmetic mean of the chunk distances (lower is more similar).
    pub mean_distance: f32,
    /// Number of the video's chunks among the neighbors.
    pub hits: usize,
}

/// Finds the video whose retrieved chunks are, on average, closest to a query.
#[derive(Clone)]
pub struct BestVideoFinder {
    search: SemanticSearch,
    k: usize,
}

impl BestVideoFinder {
    pub fn new(search: SemanticSearch, k: usize) -> Self {
        Self { search, k }
    }

    /// All videos among the query's `k` nearest chunks, best first.
    ///
    /// Ties keep the order in which each video was first returned by the store.
    #[instrument(skip(self))]
    pub async fn rank_videos(&self, query: &str) -> Result<Vec<VideoScore>> {
        let hits = self.search.neighbors(query, self.k).await?;

        let mut order: Vec<(String, Vec<f32>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for hit in hits {
            let slot = *index.entry(hit.document.video_id.clone()).or_insert_with(|| {
                order.push((hit.document.video_id.clone(), Vec::new()));
                order.len() - 1
            });
            order[slot].1.push(hit.distance);
        }

        let mut scores: Vec<VideoScore> = order
            .into_iter()
            .map(|(video_id, distances)| VideoScore {
                mean_distance: distances.iter().sum::<f32>() / distances.len() as f32,
                hits: distances.len(),
                video_id,
            })
            .collect();

        // sort_by is stable
        scores.sort_by(|a, b| {
            a.mean_distance
                .partial_cmp(&b.mean_distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        debug!("Ranked {} videos", scores.len());
        Ok(scores)
    }

    /// The best video for a query, or `None` when there is no opinion: no
    /// hits, a blank query, or a backend failure (logged).
    pub async fn find_best_video(&self, query: &str) -> Option<String> {
        match self.rank_videos(query).await {
            Ok(scores) => scores.into_iter().next().map(|score| score.video_id),
            Err(e) => {
                warn!("Best-video lookup failed: {}", e);
                None
            }
        }
    }
}
