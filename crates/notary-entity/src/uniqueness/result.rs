//! Outcome of a uniqueness check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::UniquenessCheckError;

/// The final, immutable answer for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UniquenessCheckResult {
    /// Every input was consumed and every output registered.
    Accepted {
        /// When the decision was made.
        result_timestamp: DateTime<Utc>,
    },
    /// The transaction was refused; nothing was consumed.
    Rejected {
        /// The reason for the rejection.
        error: UniquenessCheckError,
        /// When the decision was made.
        result_timestamp: DateTime<Utc>,
    },
}

impl UniquenessCheckResult {
    /// An accepted outcome at `result_timestamp`.
    pub fn accepted(result_timestamp: DateTime<Utc>) -> Self {
        Self::Accepted { result_timestamp }
    }

    /// A rejected outcome at `result_timestamp`.
    pub fn rejected(error: UniquenessCheckError, result_timestamp: DateTime<Utc>) -> Self {
        Self::Rejected {
            error,
            result_timestamp,
        }
    }

    /// Whether the transaction was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// When the decision was made.
    pub fn result_timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Accepted { result_timestamp } | Self::Rejected { result_timestamp, .. } => {
                *result_timestamp
            }
        }
    }

    /// The rejection reason, if rejected.
    pub fn error(&self) -> Option<&UniquenessCheckError> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected { error, .. } => Some(error),
        }
    }

    /// Label for log fields.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::Rejected { .. } => "rejected",
        }
    }
}
