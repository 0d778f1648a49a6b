//! Batch uniqueness checking over a backing store.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, error, info, warn};

use notary_core::clock::Clock;
use notary_core::config::CheckerConfig;
use notary_core::error::{AppError, ErrorKind};
use notary_core::result::AppResult;
use notary_core::traits::{BackingStore, BackingStoreSession, TransactionWrites};
use notary_entity::{
    HoldingIdentity, TransactionDetail, UniquenessCheckError, UniquenessCheckRequest,
    UniquenessCheckResult,
};

use super::decision;
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::replay::ReplayCache;

/// Decides and records the outcome of notarisation requests.
///
/// Requests in a batch are handled one after another, each committing
/// before the next is evaluated, so a later request may spend outputs
/// created by an earlier one and the first of two requests spending the
/// same input wins. Concurrent batches are serialised by the backing
/// store's transactions; the checker holds no locks of its own.
#[derive(Debug)]
pub struct UniquenessChecker {
    /// Durable state and outcome storage.
    store: Arc<dyn BackingStore>,
    /// Source of request and evaluation timestamps.
    clock: Arc<dyn Clock>,
    /// Committed outcomes served without a store round trip.
    replay: ReplayCache,
    /// Created/Started/Stopped gate.
    lifecycle: Lifecycle,
    /// Most outputs a single request may declare.
    max_output_states: u32,
}

impl UniquenessChecker {
    /// Creates a checker in the `Created` state.
    pub fn new(store: Arc<dyn BackingStore>, clock: Arc<dyn Clock>, config: &CheckerConfig) -> Self {
        Self {
            store,
            clock,
            replay: ReplayCache::new(config),
            lifecycle: Lifecycle::new("uniqueness-checker"),
            max_output_states: config.max_output_states,
        }
    }

    /// Start serving once the backing store answers its health check.
    pub async fn start(&self) -> AppResult<()> {
        if !self.store.health_check().await? {
            return Err(AppError::service_unavailable(
                "backing store failed its health check",
            ));
        }
        self.lifecycle.mark_started()
    }

    /// Stop serving. Batches already in `process` run to completion.
    pub fn stop(&self) {
        self.lifecycle.mark_stopped();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// The lifecycle, for awaiting transitions.
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// The replay cache.
    pub fn replay_cache(&self) -> &ReplayCache {
        &self.replay
    }

    /// Drive replay cache evictions.
    pub async fn run_maintenance(&self) {
        self.replay.run_maintenance().await;
    }

    /// Check a batch of requests, returning each request paired with its
    /// result, in request order.
    ///
    /// Business rejections are results, not errors. An error means the
    /// batch was abandoned at the failing request: outcomes for earlier
    /// requests are committed, nothing for the failing request or any
    /// later one is.
    pub async fn process(
        &self,
        requests: Vec<UniquenessCheckRequest>,
    ) -> AppResult<Vec<(UniquenessCheckRequest, UniquenessCheckResult)>> {
        self.lifecycle.ensure_started()?;

        let request_timestamp = self.now();
        let mut sessions: HashMap<HoldingIdentity, Box<dyn BackingStoreSession>> = HashMap::new();
        let mut results = Vec::with_capacity(requests.len());

        for request in requests {
            let session = match sessions.entry(request.holding_identity.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let session = self.store.session(&request.holding_identity).await?;
                    entry.insert(session)
                }
            };

            let result = self
                .check(&mut **session, &request, request_timestamp)
                .await
                .inspect_err(|err| log_failure(&request, err))?;
            results.push((request, result));
        }

        Ok(results)
    }

    async fn check(
        &self,
        session: &mut dyn BackingStoreSession,
        request: &UniquenessCheckRequest,
        request_timestamp: DateTime<Utc>,
    ) -> AppResult<UniquenessCheckResult> {
        if let Some(result) = self.stored_outcome(session, request).await? {
            debug!(
                holding_identity = %request.holding_identity,
                tx_id = %request.tx_id,
                outcome = result.outcome(),
                "Replaying committed outcome"
            );
            return Ok(result);
        }

        if let Some(error_text) = request.malformation(self.max_output_states) {
            let now = self.now();
            let error = UniquenessCheckError::MalformedRequest { error_text };
            if !request.tx_id.is_storable() {
                // No store can key this id, so the rejection is answered
                // without being recorded.
                debug!(
                    holding_identity = %request.holding_identity,
                    tx_id = %request.tx_id,
                    "Rejecting unrecordable transaction id"
                );
                return Ok(UniquenessCheckResult::rejected(error, now));
            }
            return self.reject(session, request, request_timestamp, now, error).await;
        }

        let touched = decision::touched_states(request);
        let details = session.get_state_details(&touched).await?;
        let now = self.now();

        match decision::evaluate(request, &details, now) {
            Some(error) => self.reject(session, request, request_timestamp, now, error).await,
            None => self.accept(session, request, request_timestamp, now).await,
        }
    }

    /// The clock reading at the microsecond precision outcomes are
    /// persisted with, so a replay read back from storage matches the
    /// first answer exactly.
    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }

    /// The committed outcome for the request's transaction, if any.
    async fn stored_outcome(
        &self,
        session: &mut dyn BackingStoreSession,
        request: &UniquenessCheckRequest,
    ) -> AppResult<Option<UniquenessCheckResult>> {
        if let Some(result) = self.replay.get(&request.holding_identity, &request.tx_id).await {
            return Ok(Some(result));
        }

        let mut stored = session
            .get_transaction_details(std::slice::from_ref(&request.tx_id))
            .await?;
        match stored.remove(&request.tx_id) {
            Some(detail) => {
                self.replay
                    .insert(&request.holding_identity, &request.tx_id, detail.result.clone())
                    .await;
                Ok(Some(detail.result))
            }
            None => Ok(None),
        }
    }

    async fn accept(
        &self,
        session: &mut dyn BackingStoreSession,
        request: &UniquenessCheckRequest,
        request_timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<UniquenessCheckResult> {
        let result = UniquenessCheckResult::accepted(now);

        // The outcome row goes first so a concurrent duplicate of this
        // request conflicts on the transaction id rather than on states.
        let writes = TransactionWrites::new()
            .commit_transactions(vec![TransactionDetail::new(
                request.tx_id.clone(),
                request_timestamp,
                result.clone(),
            )])
            .create_unconsumed_states(request.output_state_refs())
            .consume_states(request.tx_id.clone(), request.input_states.clone());

        match session.execute_transaction(writes).await {
            Ok(()) => {
                self.replay
                    .insert(&request.holding_identity, &request.tx_id, result.clone())
                    .await;
                debug!(
                    holding_identity = %request.holding_identity,
                    tx_id = %request.tx_id,
                    outcome = result.outcome(),
                    "Transaction accepted"
                );
                Ok(result)
            }
            Err(err) if err.is_conflict() => {
                info!(
                    holding_identity = %request.holding_identity,
                    tx_id = %request.tx_id,
                    conflicting_states = err.conflicting_states.len(),
                    "Lost race while accepting; re-evaluating"
                );
                self.resolve_lost_race(session, request, request_timestamp, now)
                    .await
            }
            Err(err) => Err(err),
        }
    }

    /// Settle a request whose accept write conflicted with a concurrent
    /// commit.
    async fn resolve_lost_race(
        &self,
        session: &mut dyn BackingStoreSession,
        request: &UniquenessCheckRequest,
        request_timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<UniquenessCheckResult> {
        if let Some(result) = self.stored_outcome(session, request).await? {
            return Ok(result);
        }

        let touched = decision::touched_states(request);
        let details = session.get_state_details(&touched).await?;
        match decision::evaluate(request, &details, now) {
            Some(error) => self.reject(session, request, request_timestamp, now, error).await,
            // States only ever move towards consumed, so a conflict always
            // leaves evidence behind; without it the store is misbehaving.
            None => Err(AppError::transient(format!(
                "accept of {} conflicted but no conflicting state was found",
                request.tx_id
            ))),
        }
    }

    /// Durably record a rejection.
    async fn reject(
        &self,
        session: &mut dyn BackingStoreSession,
        request: &UniquenessCheckRequest,
        request_timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
        error: UniquenessCheckError,
    ) -> AppResult<UniquenessCheckResult> {
        let reason = error.kind();
        let result = UniquenessCheckResult::rejected(error, now);
        let writes = TransactionWrites::new().commit_transactions(vec![TransactionDetail::new(
            request.tx_id.clone(),
            request_timestamp,
            result.clone(),
        )]);

        match session.execute_transaction(writes).await {
            Ok(()) => {
                self.replay
                    .insert(&request.holding_identity, &request.tx_id, result.clone())
                    .await;
                debug!(
                    holding_identity = %request.holding_identity,
                    tx_id = %request.tx_id,
                    outcome = result.outcome(),
                    reason,
                    "Transaction rejected"
                );
                Ok(result)
            }
            Err(err) if err.is_conflict() => {
                // Someone else recorded an outcome for this transaction
                // first; theirs stands.
                self.stored_outcome(session, request).await?.ok_or_else(|| {
                    AppError::transient(format!(
                        "outcome for {} conflicted but none is stored",
                        request.tx_id
                    ))
                })
            }
            Err(err) => Err(err),
        }
    }
}

fn log_failure(request: &UniquenessCheckRequest, err: &AppError) {
    match err.kind {
        ErrorKind::Invariant => error!(
            holding_identity = %request.holding_identity,
            tx_id = %request.tx_id,
            error = %err,
            "Invariant violated while checking transaction"
        ),
        ErrorKind::Transient | ErrorKind::ServiceUnavailable => warn!(
            holding_identity = %request.holding_identity,
            tx_id = %request.tx_id,
            error = %err,
            "Transient failure while checking transaction"
        ),
        _ => error!(
            holding_identity = %request.holding_identity,
            tx_id = %request.tx_id,
            error = %err,
            "Failed to check transaction"
        ),
    }
}
