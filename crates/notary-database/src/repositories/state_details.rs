//! Queries over `uniqueness_state_details`.

use std::collections::{HashMap, HashSet};

use sqlx::PgConnection;
use tracing::warn;

use notary_core::error::AppError;
use notary_core::result::AppResult;
use notary_entity::state::StateDetailRow;
use notary_entity::{HoldingIdentity, SecureHash, StateDetail, StateRef};

use super::keys::StateKeys;
use crate::error::classify;

/// Statements for registering, reading and consuming states.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateDetailRepository;

impl StateDetailRepository {
    /// Fetch details for every registered state in `states`.
    pub async fn find(
        conn: &mut PgConnection,
        holding_identity: &HoldingIdentity,
        states: &[StateRef],
    ) -> AppResult<HashMap<StateRef, StateDetail>> {
        if states.is_empty() {
            return Ok(HashMap::new());
        }
        let keys = StateKeys::from_refs(states)?;

        let rows = sqlx::query_as::<_, StateDetailRow>(
            "SELECT s.issue_tx_algo, s.issue_tx_id, s.issue_tx_output_idx, \
                    s.consuming_tx_algo, s.consuming_tx_id \
             FROM uniqueness_state_details s \
             JOIN UNNEST($2::varchar[], $3::bytea[], $4::int4[]) AS k(algo, id, idx) \
               ON s.issue_tx_algo = k.algo AND s.issue_tx_id = k.id \
              AND s.issue_tx_output_idx = k.idx \
             WHERE s.holding_identity = $1",
        )
        .bind(holding_identity.as_str())
        .bind(&keys.algos)
        .bind(&keys.ids)
        .bind(&keys.indexes)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to read state details"))?;

        rows.into_iter()
            .map(|row| {
                let detail = StateDetail::try_from(row)?;
                Ok((detail.state_ref.clone(), detail))
            })
            .collect()
    }

    /// Register `states` as unconsumed, leaving already-registered
    /// unconsumed rows untouched.
    pub async fn create_unconsumed(
        conn: &mut PgConnection,
        holding_identity: &HoldingIdentity,
        states: &[StateRef],
    ) -> AppResult<()> {
        if states.is_empty() {
            return Ok(());
        }
        let keys = StateKeys::from_refs(states)?;

        let inserted = sqlx::query(
            "INSERT INTO uniqueness_state_details \
                 (holding_identity, issue_tx_algo, issue_tx_id, issue_tx_output_idx) \
             SELECT $1, k.algo, k.id, k.idx \
             FROM UNNEST($2::varchar[], $3::bytea[], $4::int4[]) AS k(algo, id, idx) \
             ON CONFLICT DO NOTHING",
        )
        .bind(holding_identity.as_str())
        .bind(&keys.algos)
        .bind(&keys.ids)
        .bind(&keys.indexes)
        .execute(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to register states"))?
        .rows_affected();

        if inserted as usize == states.len() {
            return Ok(());
        }

        // Some rows already existed; that is only legitimate while they
        // are still unconsumed.
        let existing = Self::find(conn, holding_identity, states).await?;
        if let Some(consumed) = existing.values().find(|d| d.is_consumed()) {
            return Err(AppError::invariant(format!(
                "cannot re-create state {}: already consumed by {}",
                consumed.state_ref,
                consumed
                    .consuming_tx_id
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default()
            )));
        }
        Ok(())
    }

    /// Mark `states` consumed by `consuming_tx_id`.
    ///
    /// Rows are locked in key order before the update so concurrent
    /// consumers of overlapping sets queue behind each other instead of
    /// deadlocking. A consumer that finds a row already taken by someone
    /// else gets a conflict naming every unavailable state.
    pub async fn consume(
        conn: &mut PgConnection,
        holding_identity: &HoldingIdentity,
        consuming_tx_id: &SecureHash,
        states: &[StateRef],
    ) -> AppResult<()> {
        if states.is_empty() {
            return Ok(());
        }
        let mut ordered: Vec<StateRef> = states.to_vec();
        ordered.sort();
        ordered.dedup();
        let keys = StateKeys::from_refs(&ordered)?;

        sqlx::query(
            "SELECT 1 FROM uniqueness_state_details s \
             JOIN UNNEST($2::varchar[], $3::bytea[], $4::int4[]) AS k(algo, id, idx) \
               ON s.issue_tx_algo = k.algo AND s.issue_tx_id = k.id \
              AND s.issue_tx_output_idx = k.idx \
             WHERE s.holding_identity = $1 \
             ORDER BY s.issue_tx_algo, s.issue_tx_id, s.issue_tx_output_idx \
             FOR UPDATE OF s",
        )
        .bind(holding_identity.as_str())
        .bind(&keys.algos)
        .bind(&keys.ids)
        .bind(&keys.indexes)
        .execute(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to lock states"))?;

        let updated: Vec<StateDetailRow> = sqlx::query_as::<_, StateDetailRow>(
            "UPDATE uniqueness_state_details s \
             SET consuming_tx_algo = $5, consuming_tx_id = $6 \
             FROM UNNEST($2::varchar[], $3::bytea[], $4::int4[]) AS k(algo, id, idx) \
             WHERE s.holding_identity = $1 \
               AND s.issue_tx_algo = k.algo AND s.issue_tx_id = k.id \
               AND s.issue_tx_output_idx = k.idx \
               AND (s.consuming_tx_id IS NULL \
                    OR (s.consuming_tx_algo = $5 AND s.consuming_tx_id = $6)) \
             RETURNING s.issue_tx_algo, s.issue_tx_id, s.issue_tx_output_idx, \
                       s.consuming_tx_algo, s.consuming_tx_id",
        )
        .bind(holding_identity.as_str())
        .bind(&keys.algos)
        .bind(&keys.ids)
        .bind(&keys.indexes)
        .bind(consuming_tx_id.algorithm())
        .bind(consuming_tx_id.bytes())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to consume states"))?;

        if updated.len() == ordered.len() {
            return Ok(());
        }

        let consumed: HashSet<StateRef> = updated
            .into_iter()
            .map(|row| StateDetail::try_from(row).map(|d| d.state_ref))
            .collect::<Result<_, _>>()?;
        let conflicts: Vec<StateRef> = ordered
            .into_iter()
            .filter(|state| !consumed.contains(state))
            .collect();

        warn!(
            holding_identity = %holding_identity,
            tx_id = %consuming_tx_id,
            conflicts = conflicts.len(),
            "States unavailable for consumption"
        );
        Err(AppError::state_conflict(
            format!(
                "{} state(s) not available for consumption by {consuming_tx_id}",
                conflicts.len()
            ),
            conflicts,
        ))
    }
}
