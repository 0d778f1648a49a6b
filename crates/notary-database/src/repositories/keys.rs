//! Column arrays for `UNNEST`-based batch lookups.

use notary_core::error::AppError;
use notary_core::result::AppResult;
use notary_entity::{SecureHash, StateRef};

/// Parallel key columns for a list of state references.
#[derive(Debug, Default)]
pub struct StateKeys {
    /// Producing transaction digest algorithms.
    pub algos: Vec<String>,
    /// Producing transaction digest bytes.
    pub ids: Vec<Vec<u8>>,
    /// Output indexes.
    pub indexes: Vec<i32>,
}

impl StateKeys {
    /// Split `states` into key columns, in order.
    pub fn from_refs(states: &[StateRef]) -> AppResult<Self> {
        let mut keys = Self {
            algos: Vec::with_capacity(states.len()),
            ids: Vec::with_capacity(states.len()),
            indexes: Vec::with_capacity(states.len()),
        };
        for state in states {
            let index = i32::try_from(state.index).map_err(|_| {
                AppError::validation(format!("state index out of range in {state}"))
            })?;
            keys.algos.push(state.tx_hash.algorithm().to_string());
            keys.ids.push(state.tx_hash.bytes().to_vec());
            keys.indexes.push(index);
        }
        Ok(keys)
    }
}

/// Parallel key columns for a list of transaction ids.
#[derive(Debug, Default)]
pub struct TxKeys {
    /// Digest algorithms.
    pub algos: Vec<String>,
    /// Digest bytes.
    pub ids: Vec<Vec<u8>>,
}

impl TxKeys {
    /// Split `tx_ids` into key columns, in order.
    pub fn from_ids(tx_ids: &[SecureHash]) -> Self {
        Self {
            algos: tx_ids.iter().map(|id| id.algorithm().to_string()).collect(),
            ids: tx_ids.iter().map(|id| id.bytes().to_vec()).collect(),
        }
    }
}
