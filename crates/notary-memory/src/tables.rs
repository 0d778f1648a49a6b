//! Per-tenant tables and the staged-write overlay used by in-memory
//! transactions.

use std::collections::HashMap;

use notary_core::error::AppError;
use notary_core::result::AppResult;
use notary_core::traits::WriteStep;
use notary_entity::{SecureHash, StateDetail, StateRef, TransactionDetail};

/// Committed rows for one tenant.
#[derive(Debug, Default)]
pub(crate) struct TenantTables {
    /// Registered states mapped to their consumer, if any.
    pub(crate) states: HashMap<StateRef, Option<SecureHash>>,
    /// Committed outcomes by transaction id.
    pub(crate) transactions: HashMap<SecureHash, TransactionDetail>,
}

impl TenantTables {
    pub(crate) fn state_details(&self, states: &[StateRef]) -> HashMap<StateRef, StateDetail> {
        lookup_states(states, |s| self.states.get(s).cloned())
    }

    pub(crate) fn transaction_details(
        &self,
        tx_ids: &[SecureHash],
    ) -> HashMap<SecureHash, TransactionDetail> {
        lookup_transactions(tx_ids, |id| self.transactions.get(id).cloned())
    }

    /// Fold a validated overlay into the committed rows.
    pub(crate) fn merge(&mut self, delta: Delta) {
        self.states.extend(delta.states);
        self.transactions.extend(delta.transactions);
    }
}

/// Uncommitted rows written by one transaction, layered over the
/// committed tables.
#[derive(Debug, Default)]
pub(crate) struct Delta {
    states: HashMap<StateRef, Option<SecureHash>>,
    transactions: HashMap<SecureHash, TransactionDetail>,
}

impl Delta {
    fn state(&self, base: &TenantTables, state: &StateRef) -> Option<Option<SecureHash>> {
        self.states
            .get(state)
            .or_else(|| base.states.get(state))
            .cloned()
    }

    fn has_transaction(&self, base: &TenantTables, tx_id: &SecureHash) -> bool {
        self.transactions.contains_key(tx_id) || base.transactions.contains_key(tx_id)
    }

    pub(crate) fn state_details(
        &self,
        base: &TenantTables,
        states: &[StateRef],
    ) -> HashMap<StateRef, StateDetail> {
        lookup_states(states, |s| self.state(base, s))
    }

    pub(crate) fn transaction_details(
        &self,
        base: &TenantTables,
        tx_ids: &[SecureHash],
    ) -> HashMap<SecureHash, TransactionDetail> {
        lookup_transactions(tx_ids, |id| {
            self.transactions
                .get(id)
                .or_else(|| base.transactions.get(id))
                .cloned()
        })
    }

    /// Validate `step` against `base` plus earlier steps and stage it.
    ///
    /// Nothing is staged when validation fails, so a failed step never
    /// leaves half of its rows behind.
    pub(crate) fn apply(&mut self, base: &TenantTables, step: &WriteStep) -> AppResult<()> {
        match step {
            WriteStep::CreateUnconsumedStates(states) => self.create(base, states),
            WriteStep::ConsumeStates {
                consuming_tx_id,
                states,
            } => self.consume(base, consuming_tx_id, states),
            WriteStep::CommitTransactions(details) => self.commit(base, details),
        }
    }

    fn create(&mut self, base: &TenantTables, states: &[StateRef]) -> AppResult<()> {
        let mut fresh = Vec::new();
        for state in states {
            match self.state(base, state) {
                None => fresh.push(state.clone()),
                Some(None) => {}
                Some(Some(consumer)) => {
                    return Err(AppError::invariant(format!(
                        "cannot re-create state {state}: already consumed by {consumer}"
                    )));
                }
            }
        }
        self.states.extend(fresh.into_iter().map(|s| (s, None)));
        Ok(())
    }

    fn consume(
        &mut self,
        base: &TenantTables,
        consuming_tx_id: &SecureHash,
        states: &[StateRef],
    ) -> AppResult<()> {
        let mut conflicts = Vec::new();
        let mut spendable = Vec::new();
        for state in states {
            match self.state(base, state) {
                Some(None) => spendable.push(state.clone()),
                Some(Some(consumer)) if &consumer == consuming_tx_id => {}
                _ => conflicts.push(state.clone()),
            }
        }

        if !conflicts.is_empty() {
            return Err(AppError::state_conflict(
                format!(
                    "{} state(s) not available for consumption by {consuming_tx_id}",
                    conflicts.len()
                ),
                conflicts,
            ));
        }

        self.states.extend(
            spendable
                .into_iter()
                .map(|s| (s, Some(consuming_tx_id.clone()))),
        );
        Ok(())
    }

    fn commit(&mut self, base: &TenantTables, details: &[TransactionDetail]) -> AppResult<()> {
        let mut staged: HashMap<SecureHash, TransactionDetail> = HashMap::new();
        for detail in details {
            if self.has_transaction(base, &detail.tx_id) || staged.contains_key(&detail.tx_id) {
                return Err(AppError::conflict(format!(
                    "transaction {} already has a committed outcome",
                    detail.tx_id
                )));
            }
            staged.insert(detail.tx_id.clone(), detail.clone());
        }
        self.transactions.extend(staged);
        Ok(())
    }
}

fn lookup_states(
    states: &[StateRef],
    get: impl Fn(&StateRef) -> Option<Option<SecureHash>>,
) -> HashMap<StateRef, StateDetail> {
    states
        .iter()
        .filter_map(|state| {
            get(state).map(|consumer| {
                (
                    state.clone(),
                    StateDetail {
                        state_ref: state.clone(),
                        consuming_tx_id: consumer,
                    },
                )
            })
        })
        .collect()
}

fn lookup_transactions(
    tx_ids: &[SecureHash],
    get: impl Fn(&SecureHash) -> Option<TransactionDetail>,
) -> HashMap<SecureHash, TransactionDetail> {
    tx_ids
        .iter()
        .filter_map(|id| get(id).map(|detail| (id.clone(), detail)))
        .collect()
}
