//! Daesa CLI entry point.

use anyhow::Result;
use clap::Parser;
use daesa::cli::{commands, Cli, Commands};
use daesa::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let mut settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            format!("daesa={level},tower_http={level}", level = log_level)
        })))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Ingest { dir } => {
            if let Some(dir) = dir {
                settings.ingest.transcripts_dir = dir.clone();
            }
            commands::run_ingest(settings).await?;
        }

        Commands::Search { query, mode, direct } => {
            commands::run_search(query, mode, *direct, settings).await?;
        }

        Commands::BestVideo { query, ranking } => {
            commands::run_best_video(query, *ranking, settings).await?;
        }

        Commands::Segment { file, video_id } => {
            commands::run_segment(file, video_id.as_deref(), &settings)?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host.clone(), *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, config_path, settings)?;
        }
    }

    Ok(())
}
