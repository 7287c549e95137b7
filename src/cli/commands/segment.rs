//! Segment command: show how a transcript would be chunked.

use crate::config::Settings;
use crate::segmenter::{segment_transcript, SegmentingConfig, VideoRef};
use crate::transcript::read_transcript_file;
use anyhow::{Context, Result};
use std::path::Path;

/// Print the chunks of a transcript file as JSON, without indexing them.
pub fn run_segment(file: &str, video_id: Option<&str>, settings: &Settings) -> Result<()> {
    let path = Path::new(file);
    let lines = read_transcript_file(path)?
        .with_context(|| format!("Transcript file not found: {}", file))?;

    let video_id = match video_id {
        Some(id) => id.to_string(),
        None => path
            .file_stem()
            .and_then(|s| s.to_str())
            .context("Cannot derive a video id from the file name; pass --video-id")?
            .to_string(),
    };

    let video = VideoRef::new(settings.ingest.channel_id.clone(), video_id);
    let chunks = segment_transcript(&lines, &video, &SegmentingConfig::from(&settings.segmenting));
    println!("{}", serde_json::to_string_pretty(&chunks)?);
    Ok(())
}
