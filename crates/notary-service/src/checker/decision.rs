//! Pure evaluation of one request against the states it touches.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use notary_entity::{StateDetail, StateRef, UniquenessCheckError, UniquenessCheckRequest};

/// Every state a request reads: inputs first, then references.
pub fn touched_states(request: &UniquenessCheckRequest) -> Vec<StateRef> {
    request
        .input_states
        .iter()
        .chain(&request.reference_states)
        .cloned()
        .collect()
}

/// Decide whether `request` must be rejected, given the current details
/// of the states it touches and the evaluation time.
///
/// Checks run in a fixed order and the first failing check wins: unknown
/// inputs, conflicting inputs, unknown references, consumed references,
/// then the time window. Each state-based rejection cites every
/// offending state, not just the first.
pub fn evaluate(
    request: &UniquenessCheckRequest,
    details: &HashMap<StateRef, StateDetail>,
    now: DateTime<Utc>,
) -> Option<UniquenessCheckError> {
    let unknown_inputs = unknown(&request.input_states, details);
    if !unknown_inputs.is_empty() {
        return Some(UniquenessCheckError::InputStateUnknown {
            unknown_states: unknown_inputs,
        });
    }

    let conflicting_inputs: Vec<StateDetail> = request
        .input_states
        .iter()
        .filter_map(|state| details.get(state))
        .filter(|detail| detail.is_consumed_by_other(&request.tx_id))
        .cloned()
        .collect();
    if !conflicting_inputs.is_empty() {
        return Some(UniquenessCheckError::InputStateConflict {
            conflicting_states: conflicting_inputs,
        });
    }

    let unknown_references = unknown(&request.reference_states, details);
    if !unknown_references.is_empty() {
        return Some(UniquenessCheckError::ReferenceStateUnknown {
            unknown_states: unknown_references,
        });
    }

    let consumed_references: Vec<StateDetail> = request
        .reference_states
        .iter()
        .filter_map(|state| details.get(state))
        .filter(|detail| detail.is_consumed())
        .cloned()
        .collect();
    if !consumed_references.is_empty() {
        return Some(UniquenessCheckError::ReferenceStateConflict {
            conflicting_states: consumed_references,
        });
    }

    if !request.time_window_contains(now) {
        return Some(UniquenessCheckError::TimeWindowOutOfBounds {
            evaluation_timestamp: now,
            lower_bound: request.time_window_lower_bound,
            upper_bound: request.time_window_upper_bound,
        });
    }

    None
}

fn unknown(states: &[StateRef], details: &HashMap<StateRef, StateDetail>) -> Vec<StateRef> {
    states
        .iter()
        .filter(|state| !details.contains_key(state))
        .cloned()
        .collect()
}
