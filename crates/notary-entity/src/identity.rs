//! Tenant partition key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::parse::ParseError;

/// Maximum length of a holding identity, matching the width of the
/// partition column in the persisted schema.
pub const MAX_HOLDING_IDENTITY_LEN: usize = 64;

/// Identifies the tenant whose states a request operates on.
///
/// Every persisted row is prefixed with the holding identity so tenants
/// never observe each other's states or transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HoldingIdentity(String);

impl HoldingIdentity {
    /// Create a holding identity, rejecting empty or oversized values.
    pub fn new(value: impl Into<String>) -> Result<Self, ParseError> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_HOLDING_IDENTITY_LEN {
            return Err(ParseError::InvalidHoldingIdentity(value));
        }
        Ok(Self(value))
    }

    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HoldingIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HoldingIdentity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for HoldingIdentity {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<HoldingIdentity> for String {
    fn from(id: HoldingIdentity) -> String {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert!(HoldingIdentity::new("").is_err());
        assert!(HoldingIdentity::new("x".repeat(MAX_HOLDING_IDENTITY_LEN + 1)).is_err());
        assert!(HoldingIdentity::new("ABC123DEF456").is_ok());
    }
}
