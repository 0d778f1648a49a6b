//! Queries over `uniqueness_tx_details` and `uniqueness_rejected_txs`.

use std::collections::HashMap;

use sqlx::PgConnection;

use notary_core::error::{AppError, ErrorKind};
use notary_core::result::AppResult;
use notary_entity::transaction::{ResultKind, TransactionDetailRow};
use notary_entity::{HoldingIdentity, SecureHash, TransactionDetail};

use super::keys::TxKeys;
use crate::error::classify;

/// Statements for recording and reading transaction outcomes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionDetailRepository;

impl TransactionDetailRepository {
    /// Fetch committed outcomes for `tx_ids`, rejection reasons included.
    pub async fn find(
        conn: &mut PgConnection,
        holding_identity: &HoldingIdentity,
        tx_ids: &[SecureHash],
    ) -> AppResult<HashMap<SecureHash, TransactionDetail>> {
        if tx_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let keys = TxKeys::from_ids(tx_ids);

        let rows = sqlx::query_as::<_, TransactionDetailRow>(
            "SELECT t.tx_algo, t.tx_id, t.request_timestamp, t.result_timestamp, \
                    t.result, r.error_details \
             FROM uniqueness_tx_details t \
             JOIN UNNEST($2::varchar[], $3::bytea[]) AS k(algo, id) \
               ON t.tx_algo = k.algo AND t.tx_id = k.id \
             LEFT JOIN uniqueness_rejected_txs r \
               ON r.holding_identity = t.holding_identity \
              AND r.tx_algo = t.tx_algo AND r.tx_id = t.tx_id \
             WHERE t.holding_identity = $1",
        )
        .bind(holding_identity.as_str())
        .bind(&keys.algos)
        .bind(&keys.ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| classify(e, "Failed to read transaction details"))?;

        rows.into_iter()
            .map(|row| {
                let detail = TransactionDetail::try_from(row)?;
                Ok((detail.tx_id.clone(), detail))
            })
            .collect()
    }

    /// Insert one outcome row per detail, plus the reason row for
    /// rejections. A second outcome for the same id is a conflict.
    pub async fn insert(
        conn: &mut PgConnection,
        holding_identity: &HoldingIdentity,
        details: &[TransactionDetail],
    ) -> AppResult<()> {
        for detail in details {
            let kind = ResultKind::of(&detail.result);

            sqlx::query(
                "INSERT INTO uniqueness_tx_details \
                     (holding_identity, tx_algo, tx_id, request_timestamp, \
                      result_timestamp, result) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(holding_identity.as_str())
            .bind(detail.tx_id.algorithm())
            .bind(detail.tx_id.bytes())
            .bind(detail.request_timestamp)
            .bind(detail.result.result_timestamp())
            .bind(kind.as_str())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                let err = classify(e, "Failed to record transaction outcome");
                if err.kind == ErrorKind::Conflict {
                    AppError::conflict(format!(
                        "transaction {} already has a committed outcome",
                        detail.tx_id
                    ))
                } else {
                    err
                }
            })?;

            if let Some(error) = detail.result.error() {
                let error_details = serde_json::to_value(error)?;
                sqlx::query(
                    "INSERT INTO uniqueness_rejected_txs \
                         (holding_identity, tx_algo, tx_id, error_details) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(holding_identity.as_str())
                .bind(detail.tx_id.algorithm())
                .bind(detail.tx_id.bytes())
                .bind(error_details)
                .execute(&mut *conn)
                .await
                .map_err(|e| classify(e, "Failed to record rejection reason"))?;
            }
        }
        Ok(())
    }
}
