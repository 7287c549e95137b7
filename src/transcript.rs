//! Caption lines and the on-disk transcript files they are read from.
//!
//! A transcript file is a JSON array of `{text, start, duration}` entries named
//! `<video_id>.json`, the shape the caption fetcher saves.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One captioned utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptLine {
    /// Caption text.
    pub text: String,
    /// Start time in seconds.
    pub start: f64,
    /// Display duration in seconds, when the source provides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl TranscriptLine {
    pub fn new(text: impl Into<String>, start: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration: None,
        }
    }
}

/// Path of the transcript file for a video.
pub fn transcript_path(dir: &Path, video_id: &str) -> PathBuf {
    dir.join(format!("{}.json", video_id))
}

/// Save a transcript as `<dir>/<video_id>.json`.
pub fn save_transcript(dir: &Path, video_id: &str, lines: &[TranscriptLine]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = transcript_path(dir, video_id);
    let json = serde_json::to_string_pretty(lines)?;
    std::fs::write(&path, json)?;
    debug!("Saved {} lines to {:?}", lines.len(), path);
    Ok(path)
}

/// Load a stored transcript. A missing file is `None`, not an error.
pub fn load_transcript(dir: &Path, video_id: &str) -> Result<Option<Vec<TranscriptLine>>> {
    read_transcript_file(&transcript_path(dir, video_id))
}

/// Read a transcript file from an explicit path.
pub fn read_transcript_file(path: &Path) -> Result<Option<Vec<TranscriptLine>>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let lines: Vec<TranscriptLine> = serde_json::from_str(&content).map_err(|e| {
        warn!("Transcript {:?} is not valid JSON: {}", path, e);
        e
    })?;
    Ok(Some(lines))
}
