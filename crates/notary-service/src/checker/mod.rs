//! The uniqueness checker and its decision rules.

pub mod decision;
pub mod service;

pub use service::UniquenessChecker;
