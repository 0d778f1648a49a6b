//! Database rows for `uniqueness_tx_details` joined with
//! `uniqueness_rejected_txs`.

use std::fmt;

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::hash::SecureHash;
use crate::parse::ParseError;
use crate::uniqueness::{UniquenessCheckError, UniquenessCheckResult};
use super::detail::TransactionDetail;

/// Single-character outcome code stored in the hot transaction row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    /// `A`
    Accepted,
    /// `R`
    Rejected,
}

impl ResultKind {
    /// The stored code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "A",
            Self::Rejected => "R",
        }
    }

    /// The outcome code for a result.
    pub fn of(result: &UniquenessCheckResult) -> Self {
        if result.is_accepted() {
            Self::Accepted
        } else {
            Self::Rejected
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction outcome row, with the rejection reason left-joined in.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionDetailRow {
    /// Digest algorithm of the transaction id.
    pub tx_algo: String,
    /// Digest bytes of the transaction id.
    pub tx_id: Vec<u8>,
    /// When the request was received.
    pub request_timestamp: DateTime<Utc>,
    /// When the decision was made.
    pub result_timestamp: DateTime<Utc>,
    /// `A` or `R`.
    pub result: String,
    /// Serialized [`UniquenessCheckError`] for rejections.
    pub error_details: Option<serde_json::Value>,
}

impl TryFrom<TransactionDetailRow> for TransactionDetail {
    type Error = ParseError;

    fn try_from(row: TransactionDetailRow) -> Result<Self, Self::Error> {
        let tx_id = SecureHash::new(row.tx_algo, row.tx_id);
        let result = match (row.result.as_str(), row.error_details) {
            ("A", _) => UniquenessCheckResult::accepted(row.result_timestamp),
            ("R", Some(details)) => {
                let error: UniquenessCheckError = serde_json::from_value(details).map_err(|e| {
                    ParseError::CorruptRow(format!("unreadable rejection for {tx_id}: {e}"))
                })?;
                UniquenessCheckResult::rejected(error, row.result_timestamp)
            }
            ("R", None) => {
                return Err(ParseError::CorruptRow(format!(
                    "rejected transaction {tx_id} has no rejection details"
                )));
            }
            (other, _) => {
                return Err(ParseError::CorruptRow(format!(
                    "unknown result code '{other}' for {tx_id}"
                )));
            }
        };

        Ok(TransactionDetail::new(tx_id, row.request_timestamp, result))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn row(result: &str, error_details: Option<serde_json::Value>) -> TransactionDetailRow {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid time");
        TransactionDetailRow {
            tx_algo: "SHA-256".to_string(),
            tx_id: vec![0xaa],
            request_timestamp: ts,
            result_timestamp: ts,
            result: result.to_string(),
            error_details,
        }
    }

    #[test]
    fn test_accepted_row() {
        let detail = TransactionDetail::try_from(row("A", None)).expect("valid row");
        assert!(detail.result.is_accepted());
    }

    #[test]
    fn test_rejected_row_requires_details() {
        assert!(TransactionDetail::try_from(row("R", None)).is_err());
        assert!(TransactionDetail::try_from(row("X", None)).is_err());

        let details = serde_json::json!({
            "type": "malformed_request",
            "error_text": "bad",
        });
        let detail = TransactionDetail::try_from(row("R", Some(details))).expect("valid row");
        assert_eq!(
            detail.result.error().map(UniquenessCheckError::kind),
            Some("malformed_request")
        );
    }
}
