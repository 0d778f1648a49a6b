//! # notary-database
//!
//! PostgreSQL implementation of the backing store contract: connection
//! pool management, bundled migrations, and tenant-scoped sessions whose
//! transactions map one-to-one onto database transactions.

pub mod connection;
pub mod error;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use store::PostgresBackingStore;
