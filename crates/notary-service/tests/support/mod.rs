//! Shared fixtures and store wrappers for checker tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use notary_core::config::CheckerConfig;
use notary_core::error::AppError;
use notary_core::result::AppResult;
use notary_core::traits::{
    BackingStore, BackingStoreSession, TransactionOps, TransactionWrites, WriteStep,
};
use notary_core::{Clock, ManualClock};
use notary_entity::{
    HoldingIdentity, SecureHash, StateDetail, StateRef, TransactionDetail,
    UniquenessCheckRequest,
};
use notary_memory::InMemoryBackingStore;
use notary_service::UniquenessChecker;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid time")
}

pub fn t1() -> DateTime<Utc> {
    t0() + Duration::hours(1)
}

pub fn alice() -> HoldingIdentity {
    HoldingIdentity::new("ALICE").expect("valid identity")
}

pub fn tx(name: &str) -> SecureHash {
    SecureHash::sha256(name)
}

pub fn output(tx_name: &str, index: u32) -> StateRef {
    StateRef::new(tx(tx_name), index)
}

/// A request for `tx_name` with window `[t0, t1)`.
pub fn request(tx_name: &str, inputs: Vec<StateRef>, outputs: u32) -> UniquenessCheckRequest {
    request_for(alice(), tx_name, inputs, outputs)
}

/// [`request`] on behalf of `tenant`.
pub fn request_for(
    tenant: HoldingIdentity,
    tx_name: &str,
    inputs: Vec<StateRef>,
    outputs: u32,
) -> UniquenessCheckRequest {
    UniquenessCheckRequest {
        holding_identity: tenant,
        tx_id: tx(tx_name),
        input_states: inputs,
        reference_states: Vec::new(),
        num_output_states: outputs,
        time_window_lower_bound: Some(t0()),
        time_window_upper_bound: t1(),
    }
}

/// A clock sitting halfway through `[t0, t1)`.
pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(t0() + Duration::minutes(30)))
}

/// A started checker over `store`.
pub async fn started_checker(
    store: Arc<dyn BackingStore>,
    clock: Arc<dyn Clock>,
) -> UniquenessChecker {
    let checker = UniquenessChecker::new(store, clock, &CheckerConfig::default());
    checker.start().await.expect("start checker");
    checker
}

/// Backing store whose first session runs a competing write immediately
/// before the checker's first `execute_transaction`, making the checker
/// lose a race deterministically.
#[derive(Debug)]
pub struct RacingStore {
    pub inner: InMemoryBackingStore,
    competitor: Mutex<Option<(HoldingIdentity, TransactionWrites)>>,
}

impl RacingStore {
    pub fn new(inner: InMemoryBackingStore, tenant: HoldingIdentity, writes: TransactionWrites) -> Self {
        Self {
            inner,
            competitor: Mutex::new(Some((tenant, writes))),
        }
    }
}

#[async_trait]
impl BackingStore for RacingStore {
    async fn session(
        &self,
        holding_identity: &HoldingIdentity,
    ) -> AppResult<Box<dyn BackingStoreSession>> {
        let competitor = self
            .competitor
            .lock()
            .expect("competitor lock")
            .take();
        Ok(Box::new(RacingSession {
            inner: self.inner.session(holding_identity).await?,
            competitor,
            competitor_store: self.inner.clone(),
        }))
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

struct RacingSession {
    inner: Box<dyn BackingStoreSession>,
    competitor: Option<(HoldingIdentity, TransactionWrites)>,
    competitor_store: InMemoryBackingStore,
}

#[async_trait]
impl BackingStoreSession for RacingSession {
    fn holding_identity(&self) -> &HoldingIdentity {
        self.inner.holding_identity()
    }

    async fn get_state_details(
        &mut self,
        states: &[StateRef],
    ) -> AppResult<HashMap<StateRef, StateDetail>> {
        self.inner.get_state_details(states).await
    }

    async fn get_transaction_details(
        &mut self,
        tx_ids: &[SecureHash],
    ) -> AppResult<HashMap<SecureHash, TransactionDetail>> {
        self.inner.get_transaction_details(tx_ids).await
    }

    async fn begin(&mut self) -> AppResult<Box<dyn TransactionOps + '_>> {
        self.inner.begin().await
    }

    async fn execute_transaction(&mut self, writes: TransactionWrites) -> AppResult<()> {
        if let Some((tenant, competing)) = self.competitor.take() {
            let mut rival = self.competitor_store.session(&tenant).await?;
            rival.execute_transaction(competing).await?;
        }
        self.inner.execute_transaction(writes).await
    }
}

/// Backing store that fails every write plan containing a state
/// consumption with a transient error, without applying any of it.
#[derive(Debug, Default)]
pub struct FailingConsumeStore {
    pub inner: InMemoryBackingStore,
    pub failures: Arc<AtomicUsize>,
}

#[async_trait]
impl BackingStore for FailingConsumeStore {
    async fn session(
        &self,
        holding_identity: &HoldingIdentity,
    ) -> AppResult<Box<dyn BackingStoreSession>> {
        Ok(Box::new(FailingConsumeSession {
            inner: self.inner.session(holding_identity).await?,
            failures: Arc::clone(&self.failures),
        }))
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

struct FailingConsumeSession {
    inner: Box<dyn BackingStoreSession>,
    failures: Arc<AtomicUsize>,
}

#[async_trait]
impl BackingStoreSession for FailingConsumeSession {
    fn holding_identity(&self) -> &HoldingIdentity {
        self.inner.holding_identity()
    }

    async fn get_state_details(
        &mut self,
        states: &[StateRef],
    ) -> AppResult<HashMap<StateRef, StateDetail>> {
        self.inner.get_state_details(states).await
    }

    async fn get_transaction_details(
        &mut self,
        tx_ids: &[SecureHash],
    ) -> AppResult<HashMap<SecureHash, TransactionDetail>> {
        self.inner.get_transaction_details(tx_ids).await
    }

    async fn begin(&mut self) -> AppResult<Box<dyn TransactionOps + '_>> {
        self.inner.begin().await
    }

    async fn execute_transaction(&mut self, writes: TransactionWrites) -> AppResult<()> {
        let consumes = writes
            .steps()
            .iter()
            .any(|step| matches!(step, WriteStep::ConsumeStates { .. }));
        if consumes {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(AppError::transient("injected commit failure"));
        }
        self.inner.execute_transaction(writes).await
    }
}

/// Backing store that is never healthy.
#[derive(Debug, Default)]
pub struct UnhealthyStore {
    pub inner: InMemoryBackingStore,
}

#[async_trait]
impl BackingStore for UnhealthyStore {
    async fn session(
        &self,
        holding_identity: &HoldingIdentity,
    ) -> AppResult<Box<dyn BackingStoreSession>> {
        self.inner.session(holding_identity).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(false)
    }
}
