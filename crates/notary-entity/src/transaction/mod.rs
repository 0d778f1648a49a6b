//! Committed transaction outcomes.

pub mod detail;
pub mod row;

pub use detail::TransactionDetail;
pub use row::{ResultKind, TransactionDetailRow};
