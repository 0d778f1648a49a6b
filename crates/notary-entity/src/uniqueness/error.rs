//! Business rejection reasons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::{StateDetail, StateRef};

/// Why a uniqueness check rejected a transaction.
///
/// Rejections are expected outcomes, not failures: they are committed
/// durably and replayed verbatim for duplicate requests. The serialized
/// form is stored in the rejected-transaction table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UniquenessCheckError {
    /// One or more input states were never registered.
    #[error("input states unknown: {}", join(.unknown_states))]
    InputStateUnknown {
        /// Every input that has no state detail.
        unknown_states: Vec<StateRef>,
    },
    /// One or more input states were consumed by another transaction.
    #[error("input states already consumed: {}", join_details(.conflicting_states))]
    InputStateConflict {
        /// Every conflicting input together with its consumer.
        conflicting_states: Vec<StateDetail>,
    },
    /// One or more reference states were never registered.
    #[error("reference states unknown: {}", join(.unknown_states))]
    ReferenceStateUnknown {
        /// Every reference that has no state detail.
        unknown_states: Vec<StateRef>,
    },
    /// One or more reference states have already been consumed.
    #[error("reference states already consumed: {}", join_details(.conflicting_states))]
    ReferenceStateConflict {
        /// Every consumed reference together with its consumer.
        conflicting_states: Vec<StateDetail>,
    },
    /// The evaluation time fell outside the request's validity window.
    #[error("time {evaluation_timestamp} outside window [{}, {upper_bound})", lower(.lower_bound))]
    TimeWindowOutOfBounds {
        /// The clock reading used for the check.
        evaluation_timestamp: DateTime<Utc>,
        /// Inclusive lower bound, if any.
        lower_bound: Option<DateTime<Utc>>,
        /// Exclusive upper bound.
        upper_bound: DateTime<Utc>,
    },
    /// The request itself is inconsistent.
    #[error("malformed request: {error_text}")]
    MalformedRequest {
        /// Description of the inconsistency.
        error_text: String,
    },
}

impl UniquenessCheckError {
    /// Short machine-readable kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputStateUnknown { .. } => "input_state_unknown",
            Self::InputStateConflict { .. } => "input_state_conflict",
            Self::ReferenceStateUnknown { .. } => "reference_state_unknown",
            Self::ReferenceStateConflict { .. } => "reference_state_conflict",
            Self::TimeWindowOutOfBounds { .. } => "time_window_out_of_bounds",
            Self::MalformedRequest { .. } => "malformed_request",
        }
    }

    /// The state references this rejection cites, if any.
    pub fn cited_states(&self) -> Vec<&StateRef> {
        match self {
            Self::InputStateUnknown { unknown_states }
            | Self::ReferenceStateUnknown { unknown_states } => unknown_states.iter().collect(),
            Self::InputStateConflict { conflicting_states }
            | Self::ReferenceStateConflict { conflicting_states } => {
                conflicting_states.iter().map(|d| &d.state_ref).collect()
            }
            Self::TimeWindowOutOfBounds { .. } | Self::MalformedRequest { .. } => Vec::new(),
        }
    }
}

fn join(refs: &[StateRef]) -> String {
    refs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn lower(bound: &Option<DateTime<Utc>>) -> String {
    bound.map_or_else(|| "-inf".to_string(), |t| t.to_string())
}

fn join_details(details: &[StateDetail]) -> String {
    details
        .iter()
        .map(|d| d.state_ref.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::SecureHash;

    #[test]
    fn test_tagged_serialization() {
        let err = UniquenessCheckError::MalformedRequest {
            error_text: "duplicate input".to_string(),
        };
        let json = serde_json::to_value(&err).expect("serialize");
        assert_eq!(json["type"], "malformed_request");
        let parsed: UniquenessCheckError = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, err);
    }

    #[test]
    fn test_cited_states_for_conflict() {
        let state_ref = StateRef::new(SecureHash::sha256("a"), 0);
        let err = UniquenessCheckError::InputStateConflict {
            conflicting_states: vec![StateDetail::consumed(
                state_ref.clone(),
                SecureHash::sha256("b"),
            )],
        };
        assert_eq!(err.cited_states(), vec![&state_ref]);
        assert!(err.to_string().contains(&state_ref.to_string()));
    }
}
