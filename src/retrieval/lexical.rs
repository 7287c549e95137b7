//! Keyword-ranked search.

use super::{validate_query, QueryResult, SearchStrategy};
use crate::error::Result;
use crate::store::IndexStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// Passes the query to the store's term-frequency ranking over `content`.
#[derive(Clone)]
pub struct LexicalSearch {
    store: Arc<dyn IndexStore>,
    k: usize,
}

impl LexicalSearch {
    pub fn new(store: Arc<dyn IndexStore>, k: usize) -> Self {
        Self { store, k }
    }
}

#[async_trait]
impl SearchStrategy for LexicalSearch {
    fn name(&self) -> &'static str {
        "lexical"
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<QueryResult>> {
        let query = validate_query(query)?;
        let docs = self.store.lexical_search(query, self.k).await?;
        Ok(docs.into_iter().map(QueryResult::from).collect())
    }
}
