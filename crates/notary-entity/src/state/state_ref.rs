//! Pointer to one output of a prior transaction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::hash::SecureHash;
use crate::parse::ParseError;

/// Highest output index the persisted schema can hold (a signed 32-bit
/// column).
pub const MAX_STATE_INDEX: u32 = i32::MAX as u32;

/// Identifies output `index` of the transaction `tx_hash`.
///
/// The textual form is `ALGORITHM:HEX:INDEX`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StateRef {
    /// Id of the transaction that produced the state.
    pub tx_hash: SecureHash,
    /// Position of the state in the producing transaction's outputs.
    pub index: u32,
}

impl StateRef {
    /// Create a new state reference.
    pub fn new(tx_hash: SecureHash, index: u32) -> Self {
        Self { tx_hash, index }
    }

    /// Whether the reference fits the persisted key columns.
    pub fn is_storable(&self) -> bool {
        self.tx_hash.is_storable() && self.index <= MAX_STATE_INDEX
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_hash, self.index)
    }
}

impl FromStr for StateRef {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hash, index) = s
            .rsplit_once(':')
            .ok_or_else(|| ParseError::MalformedStateRef(s.to_string()))?;
        let index = index
            .parse::<u32>()
            .map_err(|_| ParseError::MalformedStateRef(s.to_string()))?;
        Ok(Self::new(hash.parse()?, index))
    }
}

impl TryFrom<String> for StateRef {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StateRef> for String {
    fn from(state_ref: StateRef) -> String {
        state_ref.to_string()
    }
}
