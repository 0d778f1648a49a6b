//! Consumption record for a registered state.

use serde::{Deserialize, Serialize};

use crate::hash::SecureHash;
use super::state_ref::StateRef;

/// The consumption status of one registered state.
///
/// A state starts unconsumed (`consuming_tx_id == None`) and is consumed
/// at most once; the consuming transaction id never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateDetail {
    /// The state this record describes.
    pub state_ref: StateRef,
    /// Transaction that consumed the state, if any.
    pub consuming_tx_id: Option<SecureHash>,
}

impl StateDetail {
    /// A freshly registered, unconsumed state.
    pub fn unconsumed(state_ref: StateRef) -> Self {
        Self {
            state_ref,
            consuming_tx_id: None,
        }
    }

    /// A state consumed by `consuming_tx_id`.
    pub fn consumed(state_ref: StateRef, consuming_tx_id: SecureHash) -> Self {
        Self {
            state_ref,
            consuming_tx_id: Some(consuming_tx_id),
        }
    }

    /// Whether any transaction has consumed the state.
    pub fn is_consumed(&self) -> bool {
        self.consuming_tx_id.is_some()
    }

    /// Whether the state was consumed by a transaction other than `tx_id`.
    pub fn is_consumed_by_other(&self, tx_id: &SecureHash) -> bool {
        self.consuming_tx_id
            .as_ref()
            .is_some_and(|consumer| consumer != tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumed_by_other() {
        let producer = SecureHash::sha256("producer");
        let spender = SecureHash::sha256("spender");
        let other = SecureHash::sha256("other");
        let state_ref = StateRef::new(producer, 0);

        let unconsumed = StateDetail::unconsumed(state_ref.clone());
        assert!(!unconsumed.is_consumed_by_other(&spender));

        let consumed = StateDetail::consumed(state_ref, spender.clone());
        assert!(!consumed.is_consumed_by_other(&spender));
        assert!(consumed.is_consumed_by_other(&other));
    }
}
