//! Scheduled job implementations.

pub mod cache_maintenance;

pub use cache_maintenance::CacheMaintenanceJob;
