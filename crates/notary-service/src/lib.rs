//! # notary-service
//!
//! The uniqueness checker. Given a batch of notarisation requests it
//! decides, per request, whether the transaction may consume its inputs,
//! records the outcome through a [`BackingStore`](notary_core::traits::BackingStore)
//! session, and returns results in request order.
//!
//! Dependencies (store, clock) are injected at construction time via
//! `Arc` references.

pub mod checker;
pub mod lifecycle;
pub mod replay;

pub use checker::UniquenessChecker;
pub use lifecycle::{Lifecycle, LifecycleState};
pub use replay::ReplayCache;
