//! Pre-flight checks before expensive operations.
//!
//! Validates that required configuration is available before starting
//! operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{DaesaError, Result};
use crate::openai::check_api_key;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion embeds every chunk and needs the transcripts.
    Ingest,
    /// Vector search embeds the query.
    SemanticSearch,
    /// Keyword and exact search only read the store.
    KeywordSearch,
    /// The server answers every kind of search.
    Serve,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ingest => {
            check_api_key()?;
            let dir = settings.transcripts_dir();
            if !dir.is_dir() {
                return Err(DaesaError::Config(format!(
                    "Transcripts directory not found: {}. Set ingest.transcripts_dir or pass --dir",
                    dir.display()
                )));
            }
        }
        Operation::SemanticSearch | Operation::Serve => {
            check_api_key()?;
        }
        Operation::KeywordSearch => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_search_has_no_requirements() {
        assert!(check(Operation::KeywordSearch, &Settings::default()).is_ok());
    }
}
