//! # notary-memory
//!
//! Process-local backing store for the uniqueness checker. Suitable for
//! single-instance deployments that can tolerate losing history on
//! restart, and for deterministic tests of the checker algorithm.

pub mod store;
mod tables;

pub use store::{InMemoryBackingStore, InMemorySession};
