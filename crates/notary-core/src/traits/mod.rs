//! Core traits defined in `notary-core` and implemented by other crates.

pub mod backing_store;

pub use backing_store::{
    BackingStore, BackingStoreSession, TransactionOps, TransactionWrites, WriteStep,
};
