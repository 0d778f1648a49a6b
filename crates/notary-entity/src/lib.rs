//! # notary-entity
//!
//! Domain models for the notary uniqueness checker. Every struct in this
//! crate is either a ledger value object (hashes, state references), a
//! persisted record (state and transaction details) or part of the
//! request/result shape exchanged with callers. Database row types
//! additionally derive `sqlx::FromRow`.
//!
//! This crate has **no** internal dependencies on other notary crates.

pub mod hash;
pub mod identity;
pub mod parse;
pub mod state;
pub mod transaction;
pub mod uniqueness;

pub use hash::SecureHash;
pub use identity::HoldingIdentity;
pub use parse::ParseError;
pub use state::{StateDetail, StateRef};
pub use transaction::TransactionDetail;
pub use uniqueness::{UniquenessCheckError, UniquenessCheckRequest, UniquenessCheckResult};
