//! Best-video command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::retrieval::youtube_link;
use crate::service::SearchService;
use anyhow::Result;

/// Run the best-video command.
pub async fn run_best_video(query: &str, ranking: bool, settings: Settings) -> Result<()> {
    preflight::check(Operation::SemanticSearch, &settings)?;
    let service = SearchService::from_settings(&settings)?;

    let spinner = Output::spinner("Ranking videos...");
    if ranking {
        let scores = service.best_video_finder().rank_videos(query).await;
        spinner.finish_and_clear();
        service.close()?;

        let scores = scores?;
        if scores.is_empty() {
            Output::warning("No videos matched your query.");
            return Ok(());
        }
        Output::header("Video Ranking");
        for score in &scores {
            Output::kv(
                &score.video_id,
                &format!("mean distance {:.4} over {} chunks", score.mean_distance, score.hits),
            );
        }
        return Ok(());
    }

    let best = service.best_video(query).await;
    spinner.finish_and_clear();
    service.close()?;

    match best {
        Some(video_id) => {
            Output::success(&format!("Best match: {}", video_id));
            println!("   {}", youtube_link(&video_id, 0.0));
        }
        None => Output::warning("No videos matched your query."),
    }
    Ok(())
}
