//! Uniqueness checker configuration.

use serde::{Deserialize, Serialize};

/// Settings for the checker's replay cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Maximum number of committed outcomes held in memory.
    #[serde(default = "default_capacity")]
    pub replay_cache_capacity: u64,
    /// Seconds an outcome may sit unread before eviction.
    #[serde(default = "default_idle")]
    pub replay_cache_idle_seconds: u64,
    /// Requests declaring more outputs than this are rejected as malformed.
    #[serde(default = "default_max_output_states")]
    pub max_output_states: u32,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            replay_cache_capacity: default_capacity(),
            replay_cache_idle_seconds: default_idle(),
            max_output_states: default_max_output_states(),
        }
    }
}

fn default_capacity() -> u64 {
    100_000
}

fn default_idle() -> u64 {
    600
}

fn default_max_output_states() -> u32 {
    10_000
}
