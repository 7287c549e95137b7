//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::service::{SearchMode, SearchService};
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, mode: &str, direct: bool, settings: Settings) -> Result<()> {
    let mode: SearchMode = mode.parse()?;
    let operation = match mode {
        SearchMode::Semantic => Operation::SemanticSearch,
        SearchMode::Lexical | SearchMode::Exact => Operation::KeywordSearch,
    };
    preflight::check(operation, &settings)?;

    let service = SearchService::from_settings(&settings)?;
    let spinner = Output::spinner("Searching...");
    let results = if direct && mode == SearchMode::Semantic {
        service.search_direct(query).await
    } else {
        service.search(mode, query).await
    };
    spinner.finish_and_clear();
    service.close()?;

    match results {
        Ok(results) if results.is_empty() => {
            Output::warning("No results found matching your query.");
        }
        Ok(results) => {
            Output::success(&format!("Found {} results", results.len()));
            for (i, result) in results.iter().enumerate() {
                Output::search_result(i + 1, result);
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
