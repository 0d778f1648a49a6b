//! Batch worker configuration.

use serde::{Deserialize, Serialize};

/// Batch worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the worker is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of batches processed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Number of batches that may wait in the queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Attempts per batch before a transient failure is reported.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts, multiplied by the attempt number.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// Cron expression for replay cache maintenance.
    #[serde(default = "default_cache_maintenance_cron")]
    pub cache_maintenance_cron: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            concurrency: default_concurrency(),
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff(),
            cache_maintenance_cron: default_cache_maintenance_cron(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    100
}

fn default_cache_maintenance_cron() -> String {
    "0 */5 * * * *".to_string()
}
