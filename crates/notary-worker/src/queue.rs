//! Bounded queue of request batches awaiting a worker.

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use notary_core::error::AppError;
use notary_core::result::AppResult;
use notary_entity::{UniquenessCheckRequest, UniquenessCheckResult};

/// What a worker sends back for one batch.
pub type BatchOutcome = AppResult<Vec<(UniquenessCheckRequest, UniquenessCheckResult)>>;

/// A batch of requests waiting for a worker.
#[derive(Debug)]
pub struct BatchJob {
    /// Batch identifier, for logs
    pub id: Uuid,
    /// Requests in submission order
    pub requests: Vec<UniquenessCheckRequest>,
    /// Where the outcome is delivered
    pub reply: oneshot::Sender<BatchOutcome>,
}

/// Submitting half of the batch queue
#[derive(Debug, Clone)]
pub struct BatchQueue {
    sender: mpsc::Sender<BatchJob>,
}

/// Receiving half of the batch queue, owned by the worker runner
#[derive(Debug)]
pub struct BatchReceiver {
    receiver: mpsc::Receiver<BatchJob>,
}

impl BatchQueue {
    /// Create a queue holding at most `capacity` waiting batches
    pub fn new(capacity: usize) -> (Self, BatchReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, BatchReceiver { receiver })
    }

    /// Enqueue a batch, waiting for room if the queue is full
    pub async fn submit(
        &self,
        requests: Vec<UniquenessCheckRequest>,
    ) -> AppResult<(Uuid, oneshot::Receiver<BatchOutcome>)> {
        let (reply, outcome) = oneshot::channel();
        let id = Uuid::now_v7();
        let size = requests.len();

        self.sender
            .send(BatchJob {
                id,
                requests,
                reply,
            })
            .await
            .map_err(|_| AppError::service_unavailable("Batch queue is closed"))?;

        tracing::debug!(batch_id = %id, size, "Batch enqueued");
        Ok((id, outcome))
    }

    /// Enqueue a batch and wait for its outcome
    pub async fn process(&self, requests: Vec<UniquenessCheckRequest>) -> BatchOutcome {
        let (id, outcome) = self.submit(requests).await?;
        outcome.await.map_err(|_| {
            AppError::service_unavailable(format!("Batch {id} was dropped before completion"))
        })?
    }
}

impl BatchReceiver {
    /// Next waiting batch, or `None` once every queue handle is gone
    pub async fn recv(&mut self) -> Option<BatchJob> {
        self.receiver.recv().await
    }

    /// Stop accepting new batches; already queued ones can still be received
    pub fn close(&mut self) {
        self.receiver.close();
    }
}
