//! Database row for the `uniqueness_state_details` table.

use sqlx::FromRow;

use crate::hash::SecureHash;
use crate::parse::ParseError;
use super::detail::StateDetail;
use super::state_ref::StateRef;

/// One row of `uniqueness_state_details`.
#[derive(Debug, Clone, FromRow)]
pub struct StateDetailRow {
    /// Digest algorithm of the producing transaction id.
    pub issue_tx_algo: String,
    /// Digest bytes of the producing transaction id.
    pub issue_tx_id: Vec<u8>,
    /// Output index within the producing transaction.
    pub issue_tx_output_idx: i32,
    /// Digest algorithm of the consuming transaction id.
    pub consuming_tx_algo: Option<String>,
    /// Digest bytes of the consuming transaction id.
    pub consuming_tx_id: Option<Vec<u8>>,
}

impl TryFrom<StateDetailRow> for StateDetail {
    type Error = ParseError;

    fn try_from(row: StateDetailRow) -> Result<Self, Self::Error> {
        let index = u32::try_from(row.issue_tx_output_idx).map_err(|_| {
            ParseError::CorruptRow(format!(
                "negative output index {} in state detail",
                row.issue_tx_output_idx
            ))
        })?;
        let state_ref = StateRef::new(SecureHash::new(row.issue_tx_algo, row.issue_tx_id), index);

        let consuming_tx_id = match (row.consuming_tx_algo, row.consuming_tx_id) {
            (Some(algo), Some(bytes)) => Some(SecureHash::new(algo, bytes)),
            (None, None) => None,
            _ => {
                return Err(ParseError::CorruptRow(format!(
                    "half-populated consuming transaction for {state_ref}"
                )));
            }
        };

        Ok(Self {
            state_ref,
            consuming_tx_id,
        })
    }
}
