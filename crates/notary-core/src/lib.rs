//! # notary-core
//!
//! Core crate for the notary uniqueness checker. Contains the backing
//! store session/transaction contract, the clock abstraction,
//! configuration schemas, and the unified error system.
//!
//! The only internal dependency is `notary-entity`, whose model types
//! appear in the contract signatures.

pub mod clock;
pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AppError, ErrorKind};
pub use result::AppResult;
