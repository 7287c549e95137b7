//! Asynchronous task layer for semantic search.
//!
//! Semantic queries are slow (an embedding call plus a neighbor scan), so they
//! run on a fixed pool of workers behind an unbounded queue. Callers submit a
//! query, get a [`TaskHandle`] back immediately, and wait on it with their own
//! timeout. Each task moves through the states of [`TaskStatus`]:
//!
//! ```text
//! pending -> running -> succeeded
//!               |  ^
//!               v  |
//!            retrying  -> failed
//! ```
//!
//! A failed attempt is retried after a fixed delay until the retry budget is
//! spent. An attempt that exceeds the hard time limit fails the task at once.
//! Tasks are acknowledged only after they finish: an attempt that dies without
//! reporting (a panicking worker) is put back on the queue for another worker,
//! so the wrapped search must be free of side effects.

mod direct;
mod worker;

pub use direct::BoundedSearch;

use crate::config::TaskSettings;
use crate::error::{DaesaError, Result};
use crate::retrieval::{validate_query, QueryResult, SearchStrategy};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use worker::{Envelope, Worker};

/// Lifecycle state of a retrieval task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Retrying,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

/// Structured terminal failure of a retrieval task.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskFailure {
    #[error("gave up after {attempts} attempts: {last_error}")]
    ExhaustedRetries { attempts: u32, last_error: String },

    #[error("attempt {attempt} exceeded the {limit:?} time limit")]
    TimeLimitExceeded { limit: Duration, attempt: u32 },

    #[error("task was lost by a worker {deliveries} times")]
    WorkerLost { deliveries: u32 },
}

impl TaskFailure {
    /// Whether the task was stopped by its hard time limit.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskFailure::TimeLimitExceeded { .. })
    }
}

/// Terminal value of a retrieval task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Succeeded(Vec<QueryResult>),
    Failed(TaskFailure),
}

/// Retry, time limit and redelivery rules applied by the workers.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Fixed delay before each retry.
    pub backoff: Duration,
    /// Hard wall-clock limit of one attempt.
    pub time_limit: Duration,
    /// Redeliveries allowed for a task whose worker died.
    pub max_redeliveries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&TaskSettings::default())
    }
}

impl From<&TaskSettings> for RetryPolicy {
    fn from(settings: &TaskSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            backoff: settings.retry_delay(),
            time_limit: settings.time_limit(),
            max_redeliveries: settings.max_redeliveries,
        }
    }
}

/// Caller-side reference to a submitted task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: Uuid,
    outcome: watch::Receiver<Option<TaskOutcome>>,
}

#[derive(Debug)]
struct TaskRecord {
    status: TaskStatus,
    attempts: u32,
    finished_at: Option<Instant>,
}

/// Status table of live and recently finished tasks.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    tasks: Mutex<HashMap<Uuid, TaskRecord>>,
}

impl Registry {
    fn with_tasks<R>(&self, f: impl FnOnce(&mut HashMap<Uuid, TaskRecord>) -> R) -> R {
        // A poisoned table still holds valid records.
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut tasks)
    }

    fn insert(&self, id: Uuid) {
        self.with_tasks(|tasks| {
            tasks.insert(
                id,
                TaskRecord {
                    status: TaskStatus::Pending,
                    attempts: 0,
                    finished_at: None,
                },
            )
        });
    }

    pub(crate) fn update(&self, id: Uuid, status: TaskStatus, attempts: u32) {
        self.with_tasks(|tasks| {
            if let Some(record) = tasks.get_mut(&id) {
                record.status = status;
                record.attempts = attempts;
                if status.is_terminal() {
                    record.finished_at = Some(Instant::now());
                }
            }
        });
    }

    fn remove(&self, id: Uuid) {
        self.with_tasks(|tasks| tasks.remove(&id));
    }

    fn get(&self, id: Uuid) -> Option<(TaskStatus, u32)> {
        self.with_tasks(|tasks| tasks.get(&id).map(|r| (r.status, r.attempts)))
    }

    fn count(&self, status: TaskStatus) -> usize {
        self.with_tasks(|tasks| tasks.values().filter(|r| r.status == status).count())
    }

    fn purge_finished_before(&self, cutoff: Instant) -> usize {
        self.with_tasks(|tasks| {
            let before = tasks.len();
            tasks.retain(|_, r| r.finished_at.map_or(true, |at| at >= cutoff));
            before - tasks.len()
        })
    }
}

/// Worker-pool queue that runs one search strategy with retries.
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<Envelope>,
    registry: Arc<Registry>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    result_ttl: Duration,
}

impl TaskQueue {
    /// Start a queue from the task settings. Must be called inside a Tokio runtime.
    pub fn start(executor: Arc<dyn SearchStrategy>, settings: &TaskSettings) -> Self {
        Self::with_policy(executor, settings.workers, RetryPolicy::from(settings))
            .with_result_ttl(settings.result_ttl())
    }

    /// Start `workers` workers applying `policy`. Must be called inside a Tokio runtime.
    pub fn with_policy(executor: Arc<dyn SearchStrategy>, workers: usize, policy: RetryPolicy) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let registry = Arc::new(Registry::default());

        let handles = (0..workers.max(1))
            .map(|id| {
                let worker = Worker {
                    id,
                    receiver: receiver.clone(),
                    redeliver: sender.clone(),
                    executor: executor.clone(),
                    policy,
                    registry: registry.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        info!(
            "Started {} {} workers ({} retries, {:?} backoff, {:?} limit)",
            workers.max(1),
            executor.name(),
            policy.max_retries,
            policy.backoff,
            policy.time_limit
        );

        Self {
            sender,
            registry,
            workers: Mutex::new(handles),
            result_ttl: TaskSettings::default().result_ttl(),
        }
    }

    /// Keep finished, unclaimed task records for `ttl`.
    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    /// Enqueue a query without waiting for it to run.
    pub fn submit(&self, query: &str) -> Result<TaskHandle> {
        let query = validate_query(query)?;

        if let Some(cutoff) = Instant::now().checked_sub(self.result_ttl) {
            let purged = self.registry.purge_finished_before(cutoff);
            if purged > 0 {
                debug!("Expired {} unclaimed task results", purged);
            }
        }

        let id = Uuid::new_v4();
        let (outcome_tx, outcome_rx) = watch::channel(None);
        self.registry.insert(id);

        let envelope = Envelope {
            id,
            query: query.to_string(),
            attempts: 0,
            deliveries: 0,
            outcome: Arc::new(outcome_tx),
        };
        if self.sender.send(envelope).is_err() {
            self.registry.remove(id);
            return Err(DaesaError::QueueClosed);
        }

        debug!("Submitted task {} ({} pending)", id, self.queue_depth());
        Ok(TaskHandle {
            id,
            outcome: outcome_rx,
        })
    }

    /// Wait up to `timeout` for a task to finish.
    ///
    /// Timing out abandons the wait only; the task keeps running and can be
    /// waited on again. A finished task's record is discarded once claimed.
    pub async fn wait(&self, handle: &TaskHandle, timeout: Duration) -> Result<Vec<QueryResult>> {
        let mut outcome = handle.outcome.clone();
        let finished = match tokio::time::timeout(timeout, outcome.wait_for(Option::is_some)).await {
            Err(_) => {
                warn!("Gave up waiting for task {} after {:?}", handle.id, timeout);
                return Err(DaesaError::WaitTimeout(timeout));
            }
            Ok(Err(_)) => return Err(DaesaError::QueueClosed),
            Ok(Ok(value)) => (*value).clone(),
        };

        self.registry.remove(handle.id);
        match finished {
            Some(TaskOutcome::Succeeded(results)) => Ok(results),
            Some(TaskOutcome::Failed(failure)) => Err(failure.into()),
            None => Err(DaesaError::QueueClosed),
        }
    }

    /// Submit a query and wait for its results.
    pub async fn run(&self, query: &str, timeout: Duration) -> Result<Vec<QueryResult>> {
        let handle = self.submit(query)?;
        self.wait(&handle, timeout).await
    }

    /// Current state of a task, or `None` once its result was claimed or expired.
    pub fn status(&self, handle: &TaskHandle) -> Option<TaskStatus> {
        self.registry.get(handle.id).map(|(status, _)| status)
    }

    /// Attempts started so far for a task.
    pub fn attempts(&self, handle: &TaskHandle) -> Option<u32> {
        self.registry.get(handle.id).map(|(_, attempts)| attempts)
    }

    /// Tasks waiting for a worker.
    pub fn queue_depth(&self) -> usize {
        self.registry.count(TaskStatus::Pending)
    }

    /// Stop all workers. Unfinished tasks are dropped and their waiters see
    /// [`DaesaError::QueueClosed`].
    pub fn shutdown(&self) {
        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        for handle in workers.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
