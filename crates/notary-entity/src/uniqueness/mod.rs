//! Request and result shapes exchanged with the uniqueness checker.

pub mod error;
pub mod request;
pub mod result;

pub use error::UniquenessCheckError;
pub use request::UniquenessCheckRequest;
pub use result::UniquenessCheckResult;
