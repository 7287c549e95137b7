//! Queue-less execution with a concurrency cap.

use crate::error::{DaesaError, Result};
use crate::retrieval::{QueryResult, SearchStrategy};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Runs a strategy in the caller's task, at most `limit` searches at once.
///
/// Callers past the limit wait for a permit, so a burst of direct requests
/// cannot pile up unbounded embedding calls.
pub struct BoundedSearch {
    inner: Arc<dyn SearchStrategy>,
    permits: Arc<Semaphore>,
}

impl BoundedSearch {
    pub fn new(inner: Arc<dyn SearchStrategy>, limit: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl SearchStrategy for BoundedSearch {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn search(&self, query: &str) -> Result<Vec<QueryResult>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DaesaError::QueueClosed)?;
        self.inner.search(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct SlowSearch {
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    #[async_trait]
    impl SearchStrategy for SlowSearch {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn search(&self, _query: &str) -> Result<Vec<QueryResult>> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_limits_concurrent_searches() {
        let inner = Arc::new(SlowSearch::default());
        let bounded = Arc::new(BoundedSearch::new(inner.clone(), 2));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let bounded = bounded.clone();
                tokio::spawn(async move { bounded.search("q").await })
            })
            .collect();
        for task in tasks {
            tokio_test::assert_ok!(task.await.unwrap());
        }

        assert!(inner.max_running.load(Ordering::SeqCst) <= 2);
        assert_eq!(bounded.available(), 2);
        assert_eq!(bounded.name(), "slow");
    }
}
