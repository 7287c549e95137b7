//! CLI module for Daesa.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Daesa - YouTube transcript line search
///
/// Finds the videos, and the moment within them, where a half-remembered line
/// was spoken.
#[derive(Parser, Debug)]
#[command(name = "daesa")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "DAESA_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Segment, embed and index transcript files not uploaded yet
    Ingest {
        /// Transcripts directory (defaults to ingest.transcripts_dir)
        #[arg(short, long)]
        dir: Option<String>,
    },

    /// Search transcripts for a line
    Search {
        /// Search query
        query: String,

        /// Strategy: vector, bm25 or exact
        #[arg(short, long, default_value = "vector")]
        mode: String,

        /// Run vector search directly instead of through the task queue
        #[arg(long)]
        direct: bool,
    },

    /// Find the single video that best matches a query
    BestVideo {
        /// Search query
        query: String,

        /// Show the full ranking with mean distances
        #[arg(long)]
        ranking: bool,
    },

    /// Print the chunks a transcript file would be indexed as
    Segment {
        /// Transcript JSON file
        file: String,

        /// Video id (defaults to the file name)
        #[arg(long)]
        video_id: Option<String>,
    },

    /// Start the HTTP search API
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the current configuration to the config file
    Init,

    /// Show configuration file path
    Path,
}
