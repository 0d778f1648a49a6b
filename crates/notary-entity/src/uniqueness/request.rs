//! Uniqueness check request.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::{MAX_ALGORITHM_LEN, SecureHash};
use crate::identity::HoldingIdentity;
use crate::state::{MAX_STATE_INDEX, StateRef};

/// A request to notarise one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniquenessCheckRequest {
    /// Tenant whose states the transaction spends.
    pub holding_identity: HoldingIdentity,
    /// Id of the transaction being notarised.
    pub tx_id: SecureHash,
    /// States the transaction consumes.
    #[serde(default)]
    pub input_states: Vec<StateRef>,
    /// States the transaction reads without consuming.
    #[serde(default)]
    pub reference_states: Vec<StateRef>,
    /// Number of outputs the transaction creates.
    #[serde(default)]
    pub num_output_states: u32,
    /// Inclusive start of the validity window; unbounded when absent.
    #[serde(default)]
    pub time_window_lower_bound: Option<DateTime<Utc>>,
    /// Exclusive end of the validity window.
    pub time_window_upper_bound: DateTime<Utc>,
}

impl UniquenessCheckRequest {
    /// References to the outputs this transaction creates, in index order.
    pub fn output_state_refs(&self) -> Vec<StateRef> {
        (0..self.num_output_states)
            .map(|index| StateRef::new(self.tx_id.clone(), index))
            .collect()
    }

    /// Whether `now` lies inside `[lower, upper)`.
    pub fn time_window_contains(&self, now: DateTime<Utc>) -> bool {
        let after_lower = self
            .time_window_lower_bound
            .is_none_or(|lower| lower <= now);
        after_lower && now < self.time_window_upper_bound
    }

    /// Describe why the request is internally inconsistent or cannot be
    /// recorded, if it is. Requests declaring more than
    /// `max_output_states` outputs are refused.
    pub fn malformation(&self, max_output_states: u32) -> Option<String> {
        if !self.tx_id.is_storable() {
            return Some(format!(
                "transaction id algorithm is longer than {MAX_ALGORITHM_LEN} bytes"
            ));
        }
        if self.num_output_states > max_output_states {
            return Some(format!(
                "{} output states exceeds the limit of {max_output_states}",
                self.num_output_states
            ));
        }
        if self.num_output_states > 0 && self.num_output_states - 1 > MAX_STATE_INDEX {
            return Some(format!(
                "output index {} exceeds {MAX_STATE_INDEX}",
                self.num_output_states - 1
            ));
        }
        if let Some(state) = self
            .input_states
            .iter()
            .chain(&self.reference_states)
            .find(|state| !state.is_storable())
        {
            return Some(format!(
                "state {state} has an index above {MAX_STATE_INDEX} or an algorithm longer than {MAX_ALGORITHM_LEN} bytes"
            ));
        }

        if let Some(lower) = self.time_window_lower_bound {
            if lower >= self.time_window_upper_bound {
                return Some(format!(
                    "time window lower bound {lower} is not before upper bound {}",
                    self.time_window_upper_bound
                ));
            }
        }

        let mut inputs = HashSet::with_capacity(self.input_states.len());
        for state in &self.input_states {
            if !inputs.insert(state) {
                return Some(format!("duplicate input state {state}"));
            }
        }

        let mut references = HashSet::with_capacity(self.reference_states.len());
        for state in &self.reference_states {
            if !references.insert(state) {
                return Some(format!("duplicate reference state {state}"));
            }
            if inputs.contains(state) {
                return Some(format!("state {state} is both an input and a reference"));
            }
        }

        None
    }
}
