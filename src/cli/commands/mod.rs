//! CLI command implementations.

mod best_video;
mod config;
mod ingest;
mod search;
mod segment;
mod serve;

pub use best_video::run_best_video;
pub use config::run_config;
pub use ingest::run_ingest;
pub use search::run_search;
pub use segment::run_segment;
pub use serve::run_serve;
