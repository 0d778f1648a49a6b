//! Contract tests against a live PostgreSQL database.
//!
//! Set `NOTARY_TEST_DATABASE_URL` to run them; without it every test
//! returns early.

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;

use notary_core::ErrorKind;
use notary_core::traits::{BackingStore, BackingStoreSession, TransactionOps, TransactionWrites};
use notary_database::migration::run_migrations;
use notary_database::{DatabasePool, PostgresBackingStore};
use notary_entity::{
    HoldingIdentity, SecureHash, StateRef, TransactionDetail, UniquenessCheckError,
    UniquenessCheckResult,
};

async fn store() -> Option<PostgresBackingStore> {
    let url = std::env::var("NOTARY_TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("connect to test database");
    let pool = DatabasePool::from_pool(pool);
    run_migrations(pool.pool()).await.expect("migrations");
    Some(PostgresBackingStore::new(pool, 2_000))
}

/// A tenant no other test run has used.
fn fresh_tenant() -> HoldingIdentity {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    HoldingIdentity::new(format!("T{nanos}-{}", std::process::id())).expect("valid identity")
}

fn state(seed: &str, index: u32) -> StateRef {
    StateRef::new(SecureHash::sha256(seed), index)
}

#[tokio::test]
async fn test_health_check_sees_migrated_schema() {
    let Some(store) = store().await else { return };
    assert!(store.health_check().await.unwrap());
}

#[tokio::test]
async fn test_create_consume_and_read_back() {
    let Some(store) = store().await else { return };
    let tenant = fresh_tenant();
    let mut session = store.session(&tenant).await.unwrap();
    let spender = SecureHash::sha256("spender");

    session
        .execute_transaction(
            TransactionWrites::new().create_unconsumed_states(vec![state("a", 0), state("a", 1)]),
        )
        .await
        .unwrap();
    session
        .execute_transaction(
            TransactionWrites::new()
                .commit_transactions(vec![TransactionDetail::new(
                    spender.clone(),
                    Utc::now(),
                    UniquenessCheckResult::accepted(Utc::now()),
                )])
                .consume_states(spender.clone(), vec![state("a", 0)]),
        )
        .await
        .unwrap();

    let details = session
        .get_state_details(&[state("a", 0), state("a", 1), state("b", 0)])
        .await
        .unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[&state("a", 0)].consuming_tx_id, Some(spender.clone()));
    assert!(!details[&state("a", 1)].is_consumed());

    let outcomes = session.get_transaction_details(&[spender.clone()]).await.unwrap();
    assert!(outcomes[&spender].result.is_accepted());
}

#[tokio::test]
async fn test_rejection_reason_round_trips() {
    let Some(store) = store().await else { return };
    let tenant = fresh_tenant();
    let mut session = store.session(&tenant).await.unwrap();
    let tx = SecureHash::sha256("rejected");

    let error = UniquenessCheckError::InputStateUnknown {
        unknown_states: vec![state("ghost", 0)],
    };
    session
        .execute_transaction(TransactionWrites::new().commit_transactions(vec![
            TransactionDetail::new(
                tx.clone(),
                Utc::now(),
                UniquenessCheckResult::rejected(error.clone(), Utc::now()),
            ),
        ]))
        .await
        .unwrap();

    let outcomes = session.get_transaction_details(&[tx.clone()]).await.unwrap();
    assert_eq!(outcomes[&tx].result.error(), Some(&error));
}

#[tokio::test]
async fn test_conflicting_consume_rolls_back_everything() {
    let Some(store) = store().await else { return };
    let tenant = fresh_tenant();
    let mut session = store.session(&tenant).await.unwrap();
    let first = SecureHash::sha256("first");
    let second = SecureHash::sha256("second");

    session
        .execute_transaction(TransactionWrites::new().create_unconsumed_states(vec![state("a", 0)]))
        .await
        .unwrap();
    session
        .execute_transaction(TransactionWrites::new().consume_states(first, vec![state("a", 0)]))
        .await
        .unwrap();

    let err = session
        .execute_transaction(
            TransactionWrites::new()
                .create_unconsumed_states(vec![state("second", 0)])
                .consume_states(second, vec![state("a", 0), state("missing", 0)]),
        )
        .await
        .expect_err("must conflict");
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(err.conflicting_states.len(), 2);

    let details = session.get_state_details(&[state("second", 0)]).await.unwrap();
    assert!(details.is_empty());
}

#[tokio::test]
async fn test_duplicate_outcome_conflicts() {
    let Some(store) = store().await else { return };
    let tenant = fresh_tenant();
    let mut session = store.session(&tenant).await.unwrap();
    let tx = SecureHash::sha256("dup");
    let detail = TransactionDetail::new(
        tx,
        Utc::now(),
        UniquenessCheckResult::accepted(Utc::now()),
    );

    session
        .execute_transaction(TransactionWrites::new().commit_transactions(vec![detail.clone()]))
        .await
        .unwrap();
    let err = session
        .execute_transaction(TransactionWrites::new().commit_transactions(vec![detail]))
        .await
        .expect_err("second outcome must conflict");
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_recreating_consumed_state_is_invariant() {
    let Some(store) = store().await else { return };
    let tenant = fresh_tenant();
    let mut session = store.session(&tenant).await.unwrap();

    session
        .execute_transaction(TransactionWrites::new().create_unconsumed_states(vec![state("a", 0)]))
        .await
        .unwrap();
    session
        .execute_transaction(
            TransactionWrites::new().consume_states(SecureHash::sha256("x"), vec![state("a", 0)]),
        )
        .await
        .unwrap();

    let mut tx = session.begin().await.unwrap();
    let err = tx
        .create_unconsumed_states(&[state("a", 0)])
        .await
        .expect_err("must fail");
    assert_eq!(err.kind, ErrorKind::Invariant);
    tx.rollback().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_consumers_exactly_one_wins() {
    let Some(store) = store().await else { return };
    let tenant = fresh_tenant();
    let mut setup = store.session(&tenant).await.unwrap();
    setup
        .execute_transaction(TransactionWrites::new().create_unconsumed_states(vec![state("a", 0)]))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        let tenant = tenant.clone();
        handles.push(tokio::spawn(async move {
            let mut session = store.session(&tenant).await.unwrap();
            session
                .execute_transaction(TransactionWrites::new().consume_states(
                    SecureHash::sha256(format!("spender-{i}")),
                    vec![state("a", 0)],
                ))
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => winners += 1,
            Err(err) => assert!(err.is_conflict(), "unexpected error: {err}"),
        }
    }
    assert_eq!(winners, 1);
}
