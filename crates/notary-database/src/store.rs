//! PostgreSQL implementation of the backing store contract.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use notary_core::result::AppResult;
use notary_core::traits::{BackingStore, BackingStoreSession, TransactionOps};
use notary_entity::{HoldingIdentity, SecureHash, StateDetail, StateRef, TransactionDetail};

use crate::connection::DatabasePool;
use crate::error::classify;
use crate::repositories::{StateDetailRepository, TransactionDetailRepository};

/// Backing store over the `uniqueness_*` tables.
///
/// All tenants share the tables; every statement is scoped by the
/// session's holding identity.
#[derive(Debug, Clone)]
pub struct PostgresBackingStore {
    pool: DatabasePool,
    lock_timeout_ms: u64,
}

impl PostgresBackingStore {
    /// Create a store over `pool`. Transactions wait at most
    /// `lock_timeout_ms` for a row lock before failing as transient.
    pub fn new(pool: DatabasePool, lock_timeout_ms: u64) -> Self {
        Self {
            pool,
            lock_timeout_ms,
        }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

#[async_trait]
impl BackingStore for PostgresBackingStore {
    async fn session(
        &self,
        holding_identity: &HoldingIdentity,
    ) -> AppResult<Box<dyn BackingStoreSession>> {
        Ok(Box::new(PostgresSession {
            holding_identity: holding_identity.clone(),
            pool: self.pool.pool().clone(),
            lock_timeout_ms: self.lock_timeout_ms,
        }))
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.pool.health_check().await
    }
}

/// Session for one tenant. Reads outside a transaction borrow a pooled
/// connection for the duration of the query.
#[derive(Debug)]
pub struct PostgresSession {
    holding_identity: HoldingIdentity,
    pool: PgPool,
    lock_timeout_ms: u64,
}

#[async_trait]
impl BackingStoreSession for PostgresSession {
    fn holding_identity(&self) -> &HoldingIdentity {
        &self.holding_identity
    }

    async fn get_state_details(
        &mut self,
        states: &[StateRef],
    ) -> AppResult<HashMap<StateRef, StateDetail>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| classify(e, "Failed to acquire connection"))?;
        StateDetailRepository::find(&mut conn, &self.holding_identity, states).await
    }

    async fn get_transaction_details(
        &mut self,
        tx_ids: &[SecureHash],
    ) -> AppResult<HashMap<SecureHash, TransactionDetail>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| classify(e, "Failed to acquire connection"))?;
        TransactionDetailRepository::find(&mut conn, &self.holding_identity, tx_ids).await
    }

    async fn begin(&mut self) -> AppResult<Box<dyn TransactionOps + '_>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| classify(e, "Failed to begin transaction"))?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await
            .map_err(|e| classify(e, "Failed to set lock timeout"))?;

        Ok(Box::new(PostgresTransaction {
            holding_identity: &self.holding_identity,
            tx,
        }))
    }
}

/// A database transaction scoped to one tenant. Dropping it without
/// committing rolls it back.
struct PostgresTransaction<'a> {
    holding_identity: &'a HoldingIdentity,
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TransactionOps for PostgresTransaction<'_> {
    async fn get_state_details(
        &mut self,
        states: &[StateRef],
    ) -> AppResult<HashMap<StateRef, StateDetail>> {
        StateDetailRepository::find(&mut self.tx, self.holding_identity, states).await
    }

    async fn get_transaction_details(
        &mut self,
        tx_ids: &[SecureHash],
    ) -> AppResult<HashMap<SecureHash, TransactionDetail>> {
        TransactionDetailRepository::find(&mut self.tx, self.holding_identity, tx_ids).await
    }

    async fn create_unconsumed_states(&mut self, states: &[StateRef]) -> AppResult<()> {
        StateDetailRepository::create_unconsumed(&mut self.tx, self.holding_identity, states).await
    }

    async fn consume_states(
        &mut self,
        consuming_tx_id: &SecureHash,
        states: &[StateRef],
    ) -> AppResult<()> {
        StateDetailRepository::consume(&mut self.tx, self.holding_identity, consuming_tx_id, states)
            .await
    }

    async fn commit_transactions(&mut self, details: &[TransactionDetail]) -> AppResult<()> {
        TransactionDetailRepository::insert(&mut self.tx, self.holding_identity, details).await
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        this.tx
            .commit()
            .await
            .map_err(|e| classify(e, "Failed to commit transaction"))?;
        debug!(holding_identity = %this.holding_identity, "Committed transaction");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        this.tx
            .rollback()
            .await
            .map_err(|e| classify(e, "Failed to roll back transaction"))?;
        debug!(holding_identity = %this.holding_identity, "Rolled back transaction");
        Ok(())
    }
}
