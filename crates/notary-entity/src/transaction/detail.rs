//! Committed transaction outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::SecureHash;
use crate::uniqueness::UniquenessCheckResult;

/// The committed outcome for one transaction id.
///
/// Created once when the outcome is committed and never modified, so a
/// repeated request can be answered from this record alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetail {
    /// The notarised transaction.
    pub tx_id: SecureHash,
    /// When the batch containing the request started processing.
    pub request_timestamp: DateTime<Utc>,
    /// The final answer.
    pub result: UniquenessCheckResult,
}

impl TransactionDetail {
    /// Create a new transaction detail.
    pub fn new(
        tx_id: SecureHash,
        request_timestamp: DateTime<Utc>,
        result: UniquenessCheckResult,
    ) -> Self {
        Self {
            tx_id,
            request_timestamp,
            result,
        }
    }
}
