//! In-process cache of committed outcomes.

use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use notary_core::config::CheckerConfig;
use notary_entity::{HoldingIdentity, SecureHash, UniquenessCheckResult};

/// Outcomes that are known to be committed, keyed by tenant and
/// transaction id.
///
/// Committed outcomes never change, so an entry is valid for as long as
/// it stays in the cache. Only outcomes read back from the store or
/// successfully committed are ever inserted.
#[derive(Debug, Clone)]
pub struct ReplayCache {
    cache: Cache<(HoldingIdentity, SecureHash), UniquenessCheckResult>,
}

impl ReplayCache {
    /// Create a cache sized from configuration.
    pub fn new(config: &CheckerConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.replay_cache_capacity)
            .time_to_idle(Duration::from_secs(config.replay_cache_idle_seconds))
            .build();
        Self { cache }
    }

    /// The committed outcome for `tx_id`, if cached.
    pub async fn get(
        &self,
        holding_identity: &HoldingIdentity,
        tx_id: &SecureHash,
    ) -> Option<UniquenessCheckResult> {
        self.cache
            .get(&(holding_identity.clone(), tx_id.clone()))
            .await
    }

    /// Remember a committed outcome.
    pub async fn insert(
        &self,
        holding_identity: &HoldingIdentity,
        tx_id: &SecureHash,
        result: UniquenessCheckResult,
    ) {
        self.cache
            .insert((holding_identity.clone(), tx_id.clone()), result)
            .await;
    }

    /// Apply pending evictions and expirations.
    pub async fn run_maintenance(&self) {
        self.cache.run_pending_tasks().await;
        debug!(entries = self.cache.entry_count(), "Replay cache maintenance complete");
    }

    /// Approximate number of cached outcomes.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
