//! Session and transaction contract between the uniqueness checker and
//! durable storage.
//!
//! A [`BackingStore`] hands out one [`BackingStoreSession`] per tenant.
//! Reads can be issued on the session directly or inside a transaction;
//! writes only inside a [`TransactionOps`] obtained from
//! [`BackingStoreSession::begin`], and become visible together on
//! [`TransactionOps::commit`]. Dropping a transaction without committing
//! discards every write staged in it.

use std::collections::HashMap;

use async_trait::async_trait;

use notary_entity::{HoldingIdentity, SecureHash, StateDetail, StateRef, TransactionDetail};

use crate::result::AppResult;

/// Factory for tenant-scoped sessions over a shared storage engine.
#[async_trait]
pub trait BackingStore: Send + Sync + std::fmt::Debug + 'static {
    /// Open a session for `holding_identity`.
    async fn session(
        &self,
        holding_identity: &HoldingIdentity,
    ) -> AppResult<Box<dyn BackingStoreSession>>;

    /// Check that the storage engine is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}

/// A unit-of-work boundary for one tenant.
#[async_trait]
pub trait BackingStoreSession: Send {
    /// The tenant this session is bound to.
    fn holding_identity(&self) -> &HoldingIdentity;

    /// Details for every state in `states` that has been registered.
    /// Unregistered states are absent from the map.
    async fn get_state_details(
        &mut self,
        states: &[StateRef],
    ) -> AppResult<HashMap<StateRef, StateDetail>>;

    /// Committed outcomes for every id in `tx_ids` that has one.
    async fn get_transaction_details(
        &mut self,
        tx_ids: &[SecureHash],
    ) -> AppResult<HashMap<SecureHash, TransactionDetail>>;

    /// Open a storage transaction.
    async fn begin(&mut self) -> AppResult<Box<dyn TransactionOps + '_>>;

    /// Apply `writes` in order inside one transaction and commit.
    ///
    /// Either every step becomes visible or none does. A
    /// [`Conflict`](crate::ErrorKind::Conflict) from any step aborts the
    /// transaction and is returned unchanged.
    async fn execute_transaction(&mut self, writes: TransactionWrites) -> AppResult<()> {
        let mut tx = self.begin().await?;
        for step in writes.into_steps() {
            let applied = match &step {
                WriteStep::CreateUnconsumedStates(states) => {
                    tx.create_unconsumed_states(states).await
                }
                WriteStep::ConsumeStates {
                    consuming_tx_id,
                    states,
                } => tx.consume_states(consuming_tx_id, states).await,
                WriteStep::CommitTransactions(details) => tx.commit_transactions(details).await,
            };

            if let Err(err) = applied {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback after failed write step failed");
                }
                return Err(err);
            }
        }
        tx.commit().await
    }
}

/// Writes (and consistent reads) inside one open storage transaction.
#[async_trait]
pub trait TransactionOps: Send {
    /// Like [`BackingStoreSession::get_state_details`], including this
    /// transaction's own uncommitted writes.
    async fn get_state_details(
        &mut self,
        states: &[StateRef],
    ) -> AppResult<HashMap<StateRef, StateDetail>>;

    /// Like [`BackingStoreSession::get_transaction_details`], including
    /// this transaction's own uncommitted writes.
    async fn get_transaction_details(
        &mut self,
        tx_ids: &[SecureHash],
    ) -> AppResult<HashMap<SecureHash, TransactionDetail>>;

    /// Register `states` as unconsumed.
    ///
    /// A state that is already registered and unconsumed is left alone.
    /// A state that is already consumed fails with
    /// [`Invariant`](crate::ErrorKind::Invariant).
    async fn create_unconsumed_states(&mut self, states: &[StateRef]) -> AppResult<()>;

    /// Mark `states` as consumed by `consuming_tx_id`.
    ///
    /// Fails with [`Conflict`](crate::ErrorKind::Conflict), citing every
    /// offending state, if any state is unregistered or consumed by a
    /// different transaction. States already consumed by
    /// `consuming_tx_id` are left alone.
    async fn consume_states(
        &mut self,
        consuming_tx_id: &SecureHash,
        states: &[StateRef],
    ) -> AppResult<()>;

    /// Record one outcome per transaction. An id that already has an
    /// outcome fails with [`Conflict`](crate::ErrorKind::Conflict).
    async fn commit_transactions(&mut self, details: &[TransactionDetail]) -> AppResult<()>;

    /// Make every write in this transaction durable and visible.
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// Discard every write in this transaction.
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// One staged write in a [`TransactionWrites`] plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStep {
    /// See [`TransactionOps::create_unconsumed_states`].
    CreateUnconsumedStates(Vec<StateRef>),
    /// See [`TransactionOps::consume_states`].
    ConsumeStates {
        /// The spending transaction.
        consuming_tx_id: SecureHash,
        /// The states it spends.
        states: Vec<StateRef>,
    },
    /// See [`TransactionOps::commit_transactions`].
    CommitTransactions(Vec<TransactionDetail>),
}

/// An ordered list of writes applied atomically by
/// [`BackingStoreSession::execute_transaction`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionWrites {
    steps: Vec<WriteStep>,
}

impl TransactionWrites {
    /// An empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage registration of `states`. Empty lists are skipped.
    pub fn create_unconsumed_states(mut self, states: Vec<StateRef>) -> Self {
        if !states.is_empty() {
            self.steps.push(WriteStep::CreateUnconsumedStates(states));
        }
        self
    }

    /// Stage consumption of `states`. Empty lists are skipped.
    pub fn consume_states(mut self, consuming_tx_id: SecureHash, states: Vec<StateRef>) -> Self {
        if !states.is_empty() {
            self.steps.push(WriteStep::ConsumeStates {
                consuming_tx_id,
                states,
            });
        }
        self
    }

    /// Stage outcome rows.
    pub fn commit_transactions(mut self, details: Vec<TransactionDetail>) -> Self {
        if !details.is_empty() {
            self.steps.push(WriteStep::CommitTransactions(details));
        }
        self
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The staged steps in application order.
    pub fn steps(&self) -> &[WriteStep] {
        &self.steps
    }

    /// Consume the plan, yielding its steps.
    pub fn into_steps(self) -> Vec<WriteStep> {
        self.steps
    }
}
