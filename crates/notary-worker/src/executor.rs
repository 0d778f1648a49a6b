//! Runs a batch through its handler and classifies
//! failures.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use notary_core::error::AppError;
use notary_core::result::AppResult;
use notary_entity::{UniquenessCheckRequest, UniquenessCheckResult};
use notary_service::UniquenessChecker;

/// Something that can decide a batch of requests
#[async_trait]
pub trait BatchHandler: Send + Sync + std::fmt::Debug {
    /// Decide every request in `requests`, in order
    async fn handle(
        &self,
        requests: Vec<UniquenessCheckRequest>,
    ) -> AppResult<Vec<(UniquenessCheckRequest, UniquenessCheckResult)>>;
}

#[async_trait]
impl BatchHandler for UniquenessChecker {
    async fn handle(
        &self,
        requests: Vec<UniquenessCheckRequest>,
    ) -> AppResult<Vec<(UniquenessCheckRequest, UniquenessCheckResult)>> {
        self.process(requests).await
    }
}

/// Error from batch execution
#[derive(Debug, thiserror::Error)]
pub enum BatchExecutionError {
    /// The batch may be redelivered
    #[error("Transient batch failure: {0}")]
    Transient(AppError),

    /// Redelivery would fail the same way
    #[error("Permanent batch failure: {0}")]
    Permanent(AppError),
}

impl BatchExecutionError {
    /// Classify an application error
    pub fn classify(err: AppError) -> Self {
        if err.is_retryable() {
            Self::Transient(err)
        } else {
            Self::Permanent(err)
        }
    }

    /// The underlying application error
    pub fn into_inner(self) -> AppError {
        match self {
            Self::Transient(err) | Self::Permanent(err) => err,
        }
    }
}

/// Runs batches through a [`BatchHandler`]
#[derive(Debug)]
pub struct BatchExecutor {
    /// The handler deciding requests
    handler: Arc<dyn BatchHandler>,
}

impl BatchExecutor {
    /// Create a new batch executor
    pub fn new(handler: Arc<dyn BatchHandler>) -> Self {
        Self { handler }
    }

    /// Execute one attempt of a batch
    pub async fn execute(
        &self,
        batch_id: Uuid,
        attempt: u32,
        requests: Vec<UniquenessCheckRequest>,
    ) -> Result<Vec<(UniquenessCheckRequest, UniquenessCheckResult)>, BatchExecutionError> {
        tracing::debug!(
            batch_id = %batch_id,
            attempt,
            size = requests.len(),
            "Executing batch"
        );

        self.handler
            .handle(requests)
            .await
            .map_err(BatchExecutionError::classify)
    }
}
