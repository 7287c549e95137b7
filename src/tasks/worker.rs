//! Worker loop: pull a task, run attempts, report the outcome.

use super::{Registry, RetryPolicy, TaskFailure, TaskOutcome, TaskStatus};
use crate::retrieval::SearchStrategy;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// A queued task and its delivery bookkeeping.
pub(super) struct Envelope {
    pub id: Uuid,
    pub query: String,
    /// Attempts that ran to a result, an error or the time limit.
    pub attempts: u32,
    /// Times a worker has taken this task off the queue.
    pub deliveries: u32,
    pub outcome: Arc<watch::Sender<Option<TaskOutcome>>>,
}

/// An in-flight attempt, aborted when dropped. A worker that is stopped
/// mid-attempt takes its attempt down with it.
struct Attempt<T>(JoinHandle<T>);

impl<T> Drop for Attempt<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub(super) struct Worker {
    pub id: usize,
    pub receiver: Arc<Mutex<mpsc::UnboundedReceiver<Envelope>>>,
    pub redeliver: mpsc::UnboundedSender<Envelope>,
    pub executor: Arc<dyn SearchStrategy>,
    pub policy: RetryPolicy,
    pub registry: Arc<Registry>,
}

impl Worker {
    pub async fn run(self) {
        loop {
            let next = self.receiver.lock().await.recv().await;
            match next {
                Some(envelope) => self.process(envelope).await,
                None => break,
            }
        }
        debug!("Worker {} stopped", self.id);
    }

    async fn process(&self, mut envelope: Envelope) {
        envelope.deliveries += 1;

        loop {
            let attempt = envelope.attempts + 1;
            self.registry.update(envelope.id, TaskStatus::Running, attempt);
            debug!(
                "Worker {} running task {} (attempt {}, delivery {})",
                self.id, envelope.id, attempt, envelope.deliveries
            );

            // Each attempt runs as its own task so a panic surfaces as a
            // JoinError instead of taking the worker down.
            let executor = self.executor.clone();
            let query = envelope.query.clone();
            let mut running = Attempt(tokio::spawn(async move { executor.search(&query).await }));

            let joined = match tokio::time::timeout(self.policy.time_limit, &mut running.0).await {
                Ok(joined) => joined,
                Err(_) => {
                    drop(running);
                    envelope.attempts = attempt;
                    warn!(
                        "Task {} hit the {:?} time limit on attempt {}",
                        envelope.id, self.policy.time_limit, attempt
                    );
                    self.finish(
                        &envelope,
                        TaskOutcome::Failed(TaskFailure::TimeLimitExceeded {
                            limit: self.policy.time_limit,
                            attempt,
                        }),
                    );
                    return;
                }
            };

            match joined {
                Ok(Ok(results)) => {
                    envelope.attempts = attempt;
                    debug!("Task {} returned {} results", envelope.id, results.len());
                    self.finish(&envelope, TaskOutcome::Succeeded(results));
                    return;
                }
                Ok(Err(e)) => {
                    envelope.attempts = attempt;
                    if attempt > self.policy.max_retries {
                        error!("Task {} failed after {} attempts: {}", envelope.id, attempt, e);
                        self.finish(
                            &envelope,
                            TaskOutcome::Failed(TaskFailure::ExhaustedRetries {
                                attempts: attempt,
                                last_error: e.to_string(),
                            }),
                        );
                        return;
                    }
                    warn!(
                        "Task {} attempt {} failed, retrying in {:?}: {}",
                        envelope.id, attempt, self.policy.backoff, e
                    );
                    self.registry.update(envelope.id, TaskStatus::Retrying, attempt);
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(join_error) => {
                    // Never acknowledged: the attempt does not count and the
                    // task goes back on the queue.
                    self.redeliver_lost(envelope, join_error);
                    return;
                }
            }
        }
    }

    fn redeliver_lost(&self, envelope: Envelope, cause: tokio::task::JoinError) {
        if envelope.deliveries > self.policy.max_redeliveries {
            error!(
                "Task {} lost {} times, giving up: {}",
                envelope.id, envelope.deliveries, cause
            );
            let failure = TaskFailure::WorkerLost {
                deliveries: envelope.deliveries,
            };
            self.finish(&envelope, TaskOutcome::Failed(failure));
            return;
        }

        warn!("Task {} lost by worker {}, redelivering: {}", envelope.id, self.id, cause);
        self.registry
            .update(envelope.id, TaskStatus::Pending, envelope.attempts);
        if let Err(mpsc::error::SendError(envelope)) = self.redeliver.send(envelope) {
            let failure = TaskFailure::WorkerLost {
                deliveries: envelope.deliveries,
            };
            self.finish(&envelope, TaskOutcome::Failed(failure));
        }
    }

    fn finish(&self, envelope: &Envelope, outcome: TaskOutcome) {
        let status = match outcome {
            TaskOutcome::Succeeded(_) => TaskStatus::Succeeded,
            TaskOutcome::Failed(_) => TaskStatus::Failed,
        };
        self.registry.update(envelope.id, status, envelope.attempts);
        envelope.outcome.send_replace(Some(outcome));
    }
}
