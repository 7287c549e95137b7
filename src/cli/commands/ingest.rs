//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::OpenAIEmbedder;
use crate::ingest::Ingestor;
use crate::store::open_store;
use anyhow::Result;
use std::sync::Arc;

/// Run the ingest command.
pub async fn run_ingest(settings: Settings) -> Result<()> {
    preflight::check(Operation::Ingest, &settings)?;

    if settings.ingest.channel_id.is_empty() {
        Output::warning("ingest.channel_id is not set; chunks will have an empty channel id.");
    }

    let store = open_store(&settings)?;
    let embedder = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);
    let ingestor = Ingestor::new(store.handle(), embedder, &settings)?;

    let pending = ingestor.pending_files()?;
    if pending.is_empty() {
        Output::success("All transcripts are already uploaded.");
        return Ok(());
    }

    Output::info(&format!("Uploading {} transcript files", pending.len()));
    let pb = Output::progress_bar(pending.len() as u64, "ingesting");

    let report = ingestor
        .run_with(|outcome| {
            match &outcome.result {
                Ok(count) => pb.set_message(format!("{} ({} chunks)", outcome.file_name, count)),
                Err(e) => pb.println(format!("  skipped {}: {}", outcome.file_name, e)),
            }
            pb.inc(1);
        })
        .await?;
    pb.finish_and_clear();

    Output::header("Upload Results");
    Output::kv("Processed", &report.processed.to_string());
    Output::kv("Succeeded", &report.succeeded.to_string());
    Output::kv("Failed", &report.failed.to_string());
    Output::kv("Documents", &store.document_count().await?.to_string());

    if report.failed > 0 {
        Output::warning("Failed files stay pending and are retried on the next run.");
    }
    Ok(())
}
