//! Replay cache maintenance.

use std::sync::Arc;

use notary_service::UniquenessChecker;

/// Applies pending replay cache evictions so idle entries release memory
/// even when the checker is quiet.
#[derive(Debug, Clone)]
pub struct CacheMaintenanceJob {
    /// Checker owning the cache
    checker: Arc<UniquenessChecker>,
}

impl CacheMaintenanceJob {
    /// Create a new cache maintenance job
    pub fn new(checker: Arc<UniquenessChecker>) -> Self {
        Self { checker }
    }

    /// Run one maintenance pass
    pub async fn run(&self) {
        let before = self.checker.replay_cache().entry_count();
        self.checker.run_maintenance().await;
        let after = self.checker.replay_cache().entry_count();
        tracing::debug!(
            "Replay cache maintenance: {} entries before, {} after",
            before,
            after
        );
    }
}

#[cfg(test)]
mod tests {
    use notary_core::SystemClock;
    use notary_core::config::CheckerConfig;
    use notary_memory::InMemoryBackingStore;

    use super::*;

    #[tokio::test]
    async fn test_run_on_empty_cache() {
        let checker = Arc::new(UniquenessChecker::new(
            Arc::new(InMemoryBackingStore::new()),
            Arc::new(SystemClock),
            &CheckerConfig::default(),
        ));
        let job = CacheMaintenanceJob::new(Arc::clone(&checker));
        job.run().await;
        assert_eq!(checker.replay_cache().entry_count(), 0);
    }
}
