//! Drains the batch queue with bounded concurrency.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tokio::time;
use uuid::Uuid;

use notary_core::config::WorkerConfig;
use notary_entity::UniquenessCheckRequest;

use crate::executor::{BatchExecutionError, BatchExecutor};
use crate::queue::{BatchOutcome, BatchReceiver};

/// How long shutdown waits for in-flight batches
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Main worker runner that receives batches and executes them
#[derive(Debug)]
pub struct WorkerRunner {
    /// Receiving half of the batch queue
    receiver: BatchReceiver,
    /// Batch executor
    executor: Arc<BatchExecutor>,
    /// Worker configuration
    config: WorkerConfig,
    /// Worker identifier
    worker_id: String,
}

impl WorkerRunner {
    /// Create a new worker runner
    pub fn new(
        receiver: BatchReceiver,
        executor: Arc<BatchExecutor>,
        config: WorkerConfig,
        worker_id: String,
    ) -> Self {
        Self {
            receiver,
            executor,
            config,
            worker_id,
        }
    }

    /// Run until the cancel signal is received or every queue handle is
    /// dropped, then wait for in-flight batches to finish
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            "Worker '{}' started with concurrency={}, max_attempts={}",
            self.worker_id,
            self.config.concurrency,
            self.config.max_attempts
        );

        let concurrency = self.config.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));

        loop {
            let permit = tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!("Worker '{}' received shutdown signal", self.worker_id);
                        break;
                    }
                    continue;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let job = tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!("Worker '{}' received shutdown signal", self.worker_id);
                        break;
                    }
                    continue;
                }
                job = self.receiver.recv() => match job {
                    Some(job) => job,
                    None => {
                        tracing::info!("Worker '{}' queue closed", self.worker_id);
                        break;
                    }
                },
            };

            let executor = Arc::clone(&self.executor);
            let max_attempts = self.config.max_attempts.max(1);
            let backoff = Duration::from_millis(self.config.retry_backoff_ms);

            tokio::spawn(async move {
                let _permit = permit;
                let outcome =
                    execute_with_retry(&executor, job.id, job.requests, max_attempts, backoff)
                        .await;
                if job.reply.send(outcome).is_err() {
                    tracing::debug!(batch_id = %job.id, "Submitter went away before the reply");
                }
            });
        }

        self.receiver.close();

        tracing::info!(
            "Worker '{}' waiting for in-flight batches to complete...",
            self.worker_id
        );

        let permits = u32::try_from(concurrency).unwrap_or(u32::MAX);
        if time::timeout(DRAIN_TIMEOUT, semaphore.acquire_many(permits))
            .await
            .is_err()
        {
            tracing::warn!("Worker '{}' drain timed out", self.worker_id);
        }

        tracing::info!("Worker '{}' shut down complete", self.worker_id);
    }
}

/// Run a batch, redelivering it after transient failures.
///
/// Redelivery reprocesses the whole batch; requests that committed on an
/// earlier attempt replay their stored outcome.
async fn execute_with_retry(
    executor: &BatchExecutor,
    batch_id: Uuid,
    requests: Vec<UniquenessCheckRequest>,
    max_attempts: u32,
    backoff: Duration,
) -> BatchOutcome {
    let mut attempt = 1;
    loop {
        match executor.execute(batch_id, attempt, requests.clone()).await {
            Ok(results) => {
                let accepted = results.iter().filter(|(_, r)| r.is_accepted()).count();
                tracing::info!(
                    batch_id = %batch_id,
                    attempt,
                    accepted,
                    rejected = results.len() - accepted,
                    "Batch completed"
                );
                return Ok(results);
            }
            Err(BatchExecutionError::Transient(err)) if attempt < max_attempts => {
                tracing::warn!(
                    batch_id = %batch_id,
                    attempt,
                    max_attempts,
                    error = %err,
                    "Batch failed (transient), retrying"
                );
                time::sleep(backoff * attempt).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::error!(batch_id = %batch_id, attempt, error = %err, "Batch failed");
                return Err(err.into_inner());
            }
        }
    }
}
