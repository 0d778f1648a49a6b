//! Query sets for the uniqueness tables.
//!
//! Every query is scoped by holding identity and runs on a caller-supplied
//! connection, so the same statements serve plain reads and reads or
//! writes inside an open transaction.

pub mod keys;
pub mod state_details;
pub mod transaction_details;

pub use state_details::StateDetailRepository;
pub use transaction_details::TransactionDetailRepository;
