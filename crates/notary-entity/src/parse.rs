//! Parse errors for the textual forms of ledger identifiers.

use thiserror::Error;

/// Failure to parse or convert a ledger identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The hash string is not of the form `ALGORITHM:HEX`.
    #[error("malformed secure hash '{0}'")]
    MalformedHash(String),
    /// The hash bytes are not valid hexadecimal.
    #[error("invalid hex in secure hash '{0}'")]
    InvalidHex(String),
    /// The state reference is not of the form `ALGORITHM:HEX:INDEX`.
    #[error("malformed state reference '{0}'")]
    MalformedStateRef(String),
    /// The holding identity is empty or too long.
    #[error("invalid holding identity '{0}'")]
    InvalidHoldingIdentity(String),
    /// A stored row cannot be mapped back onto the domain model.
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}
