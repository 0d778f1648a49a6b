//! Algorithm-tagged digests used as transaction identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::parse::ParseError;

/// Name of the SHA-256 digest algorithm.
pub const SHA_256: &str = "SHA-256";

/// Longest algorithm name the persisted schema can key on.
pub const MAX_ALGORITHM_LEN: usize = 32;

/// A digest together with the name of the algorithm that produced it.
///
/// The textual form is `ALGORITHM:HEX` with upper-case hex, for example
/// `SHA-256:9F86D0…`. Two hashes are equal only if both the algorithm and
/// the bytes match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecureHash {
    algorithm: String,
    bytes: Vec<u8>,
}

impl SecureHash {
    /// Create a hash from an algorithm name and raw digest bytes.
    pub fn new(algorithm: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm: algorithm.into(),
            bytes: bytes.into(),
        }
    }

    /// Compute the SHA-256 digest of `data`.
    pub fn sha256(data: impl AsRef<[u8]>) -> Self {
        let digest = Sha256::digest(data.as_ref());
        Self::new(SHA_256, digest.to_vec())
    }

    /// The digest algorithm name.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// The raw digest bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the algorithm name fits the persisted key columns.
    pub fn is_storable(&self) -> bool {
        self.algorithm.len() <= MAX_ALGORITHM_LEN
    }

    /// Upper-case hex rendering of the digest bytes.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.bytes)
    }
}

impl fmt::Display for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

impl FromStr for SecureHash {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, digest) = s
            .split_once(':')
            .ok_or_else(|| ParseError::MalformedHash(s.to_string()))?;
        if algorithm.is_empty() || digest.is_empty() {
            return Err(ParseError::MalformedHash(s.to_string()));
        }
        let bytes = hex::decode(digest).map_err(|_| ParseError::InvalidHex(s.to_string()))?;
        Ok(Self::new(algorithm, bytes))
    }
}

impl TryFrom<String> for SecureHash {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SecureHash> for String {
    fn from(hash: SecureHash) -> String {
        hash.to_string()
    }
}
