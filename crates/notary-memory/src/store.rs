//! In-memory backing store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::debug;

use notary_core::result::AppResult;
use notary_core::traits::{BackingStore, BackingStoreSession, TransactionOps, WriteStep};
use notary_entity::{HoldingIdentity, SecureHash, StateDetail, StateRef, TransactionDetail};

use crate::tables::{Delta, TenantTables};

/// Backing store holding every tenant's rows in process memory.
///
/// Each tenant's tables sit behind their own async `RwLock`. Transactions
/// validate each write as it is issued and again under the write lock at
/// commit, so a transaction that lost a race to a concurrent commit fails
/// with a conflict instead of overwriting the winner.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackingStore {
    tenants: Arc<DashMap<HoldingIdentity, Arc<RwLock<TenantTables>>>>,
}

impl InMemoryBackingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self, holding_identity: &HoldingIdentity) -> Arc<RwLock<TenantTables>> {
        Arc::clone(
            self.tenants
                .entry(holding_identity.clone())
                .or_default()
                .value(),
        )
    }

    /// Number of tenants that have opened at least one session.
    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }
}

#[async_trait]
impl BackingStore for InMemoryBackingStore {
    async fn session(
        &self,
        holding_identity: &HoldingIdentity,
    ) -> AppResult<Box<dyn BackingStoreSession>> {
        Ok(Box::new(InMemorySession {
            holding_identity: holding_identity.clone(),
            tables: self.tables(holding_identity),
        }))
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

/// Session over one tenant's in-memory tables.
#[derive(Debug)]
pub struct InMemorySession {
    holding_identity: HoldingIdentity,
    tables: Arc<RwLock<TenantTables>>,
}

#[async_trait]
impl BackingStoreSession for InMemorySession {
    fn holding_identity(&self) -> &HoldingIdentity {
        &self.holding_identity
    }

    async fn get_state_details(
        &mut self,
        states: &[StateRef],
    ) -> AppResult<HashMap<StateRef, StateDetail>> {
        Ok(self.tables.read().await.state_details(states))
    }

    async fn get_transaction_details(
        &mut self,
        tx_ids: &[SecureHash],
    ) -> AppResult<HashMap<SecureHash, TransactionDetail>> {
        Ok(self.tables.read().await.transaction_details(tx_ids))
    }

    async fn begin(&mut self) -> AppResult<Box<dyn TransactionOps + '_>> {
        Ok(Box::new(InMemoryTransaction {
            holding_identity: &self.holding_identity,
            tables: Arc::clone(&self.tables),
            steps: Vec::new(),
            delta: Delta::default(),
        }))
    }
}

/// An open in-memory transaction. Writes live in `delta` until commit.
struct InMemoryTransaction<'a> {
    holding_identity: &'a HoldingIdentity,
    tables: Arc<RwLock<TenantTables>>,
    steps: Vec<WriteStep>,
    delta: Delta,
}

impl InMemoryTransaction<'_> {
    async fn stage(&mut self, step: WriteStep) -> AppResult<()> {
        let base = self.tables.read().await;
        self.delta.apply(&base, &step)?;
        drop(base);
        self.steps.push(step);
        Ok(())
    }
}

#[async_trait]
impl TransactionOps for InMemoryTransaction<'_> {
    async fn get_state_details(
        &mut self,
        states: &[StateRef],
    ) -> AppResult<HashMap<StateRef, StateDetail>> {
        let base = self.tables.read().await;
        Ok(self.delta.state_details(&base, states))
    }

    async fn get_transaction_details(
        &mut self,
        tx_ids: &[SecureHash],
    ) -> AppResult<HashMap<SecureHash, TransactionDetail>> {
        let base = self.tables.read().await;
        Ok(self.delta.transaction_details(&base, tx_ids))
    }

    async fn create_unconsumed_states(&mut self, states: &[StateRef]) -> AppResult<()> {
        self.stage(WriteStep::CreateUnconsumedStates(states.to_vec()))
            .await
    }

    async fn consume_states(
        &mut self,
        consuming_tx_id: &SecureHash,
        states: &[StateRef],
    ) -> AppResult<()> {
        self.stage(WriteStep::ConsumeStates {
            consuming_tx_id: consuming_tx_id.clone(),
            states: states.to_vec(),
        })
        .await
    }

    async fn commit_transactions(&mut self, details: &[TransactionDetail]) -> AppResult<()> {
        self.stage(WriteStep::CommitTransactions(details.to_vec()))
            .await
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let mut tables = self.tables.write().await;

        // Rows may have changed since each step was staged; replay every
        // step against the tables as they are now.
        let mut delta = Delta::default();
        for step in &self.steps {
            delta.apply(&tables, step)?;
        }
        tables.merge(delta);

        debug!(
            holding_identity = %self.holding_identity,
            steps = self.steps.len(),
            "Committed in-memory transaction"
        );
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        debug!(
            holding_identity = %self.holding_identity,
            discarded_steps = self.steps.len(),
            "Rolled back in-memory transaction"
        );
        Ok(())
    }
}
