//! Ledger state references and their consumption records.

pub mod detail;
pub mod row;
pub mod state_ref;

pub use detail::StateDetail;
pub use row::StateDetailRow;
pub use state_ref::{MAX_STATE_INDEX, StateRef};
