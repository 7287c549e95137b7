//! Audit trail of served searches.
//!
//! Each non-empty result set handed to a caller is written as its own JSON
//! file, `search_<YYYYmmdd_HHMMSS>.json`, in the history directory. Files are
//! never overwritten: searches landing in the same second get a numeric suffix.

use crate::error::Result;
use crate::retrieval::QueryResult;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One audited search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    /// Local time of the search, `YYYYmmdd_HHMMSS`.
    pub timestamp: String,
    pub question: String,
    pub results: Vec<QueryResult>,
}

impl SearchRecord {
    pub fn new(question: impl Into<String>, results: Vec<QueryResult>) -> Self {
        Self::at(Local::now(), question, results)
    }

    pub fn at(time: DateTime<Local>, question: impl Into<String>, results: Vec<QueryResult>) -> Self {
        Self {
            timestamp: time.format("%Y%m%d_%H%M%S").to_string(),
            question: question.into(),
            results,
        }
    }
}

/// Writes search records into a directory.
#[derive(Debug, Clone)]
pub struct SearchHistory {
    dir: PathBuf,
}

impl SearchHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a record and return the file it was written to.
    pub fn record(&self, record: &SearchRecord) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(record)?;

        let mut suffix = 0u32;
        loop {
            let name = match suffix {
                0 => format!("search_{}.json", record.timestamp),
                n => format!("search_{}_{}.json", record.timestamp, n),
            };
            let path = self.dir.join(name);

            // create_new makes the existence check and the write one step.
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(json.as_bytes())?;
                    debug!("Recorded search to {:?}", path);
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Record a search if it produced results. Empty result sets are not audited.
    pub fn record_results(&self, question: &str, results: &[QueryResult]) -> Result<Option<PathBuf>> {
        if results.is_empty() {
            return Ok(None);
        }
        self.record(&SearchRecord::new(question, results.to_vec()))
            .map(Some)
    }
}
