//! Transcript segmentation into retrievable chunks.
//!
//! Caption lines are first grouped into fixed-size runs of consecutive lines,
//! then any group whose text is too long to embed is split into overlapping
//! character windows.

mod group;
mod split;

pub use group::group;
pub use split::{split, split_text};

use crate::transcript::TranscriptLine;
use serde::{Deserialize, Serialize};

/// Consecutive caption lines that are indexed together.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentGroup {
    /// The lines, in transcript order.
    pub lines: Vec<TranscriptLine>,
}

impl SegmentGroup {
    pub fn new(lines: Vec<TranscriptLine>) -> Self {
        Self { lines }
    }

    /// Space-joined text of the lines.
    pub fn content(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Start of the first line.
    pub fn start(&self) -> Option<f64> {
        self.lines.first().map(|line| line.start)
    }

    /// Start (not end of speech) of the last line.
    pub fn end(&self) -> Option<f64> {
        self.lines.last().map(|line| line.start)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// The retrievable unit: a bounded piece of transcript text with its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub channel_id: String,
    pub video_id: String,
    /// Start time of the first line of the source group.
    pub start: f64,
    /// Start time of the last line of the source group.
    pub end: f64,
}

/// Identifies the video a transcript belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub channel_id: String,
    pub video_id: String,
}

impl VideoRef {
    pub fn new(channel_id: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            video_id: video_id.into(),
        }
    }
}

/// Segmentation parameters.
#[derive(Debug, Clone, Copy)]
pub struct SegmentingConfig {
    /// Maximum number of lines per group.
    pub group_size: usize,
    /// Maximum chunk length in characters.
    pub max_len: usize,
    /// Characters shared by consecutive windows of one group.
    pub overlap: usize,
}

impl Default for SegmentingConfig {
    fn default() -> Self {
        Self {
            group_size: 10,
            max_len: 3000,
            overlap: 300,
        }
    }
}

impl From<&crate::config::SegmentingSettings> for SegmentingConfig {
    fn from(settings: &crate::config::SegmentingSettings) -> Self {
        Self {
            group_size: settings.group_size,
            max_len: settings.chunk_size,
            overlap: settings.chunk_overlap,
        }
    }
}

/// Group a transcript and split every group into chunks.
pub fn segment_transcript(
    lines: &[TranscriptLine],
    video: &VideoRef,
    config: &SegmentingConfig,
) -> Vec<Chunk> {
    group(lines, config.group_size)
        .iter()
        .flat_map(|g| split(g, video, config.max_len, config.overlap))
        .collect()
}
