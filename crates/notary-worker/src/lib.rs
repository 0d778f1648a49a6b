//! Batch processing and scheduled tasks for the notary.
//!
//! This crate provides:
//! - A bounded queue that callers submit request batches to
//! - A worker runner that drains the queue with bounded concurrency
//! - A batch executor that classifies failures as transient or permanent
//! - A cron scheduler for periodic replay cache maintenance

pub mod executor;
pub mod jobs;
pub mod queue;
pub mod runner;
pub mod scheduler;

pub use executor::{BatchExecutionError, BatchExecutor, BatchHandler};
pub use queue::{BatchJob, BatchQueue, BatchReceiver};
pub use runner::WorkerRunner;
pub use scheduler::CronScheduler;
