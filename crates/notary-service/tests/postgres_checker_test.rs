//! Behaviour of the uniqueness checker over PostgreSQL.
//!
//! Set `NOTARY_TEST_DATABASE_URL` to run them; without it every test
//! returns early.

mod support;

use std::sync::Arc;

use chrono::{Duration, Utc};

use notary_core::ManualClock;
use notary_core::config::DatabaseConfig;
use notary_core::traits::{BackingStore, BackingStoreSession};
use notary_database::migration::run_migrations;
use notary_database::{DatabasePool, PostgresBackingStore};
use notary_entity::{
    HoldingIdentity, SecureHash, StateDetail, StateRef, UniquenessCheckError,
    UniquenessCheckResult,
};

use support::*;

async fn store() -> Option<Arc<PostgresBackingStore>> {
    let url = std::env::var("NOTARY_TEST_DATABASE_URL").ok()?;
    let config = DatabaseConfig {
        url,
        max_connections: 16,
        ..DatabaseConfig::default()
    };
    let pool = DatabasePool::connect(&config)
        .await
        .expect("connect to test database");
    run_migrations(pool.pool()).await.expect("migrations");
    Some(Arc::new(PostgresBackingStore::new(pool, config.lock_timeout_ms)))
}

/// A tenant no other test run has used.
fn fresh_tenant() -> HoldingIdentity {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    HoldingIdentity::new(format!("C{nanos}-{}", std::process::id())).expect("valid identity")
}

fn error_of(result: &UniquenessCheckResult) -> &UniquenessCheckError {
    result.error().expect("expected a rejection")
}

#[tokio::test]
async fn test_issue_spend_double_spend_and_replay() {
    let Some(store) = store().await else { return };
    let tenant = fresh_tenant();
    let checker = started_checker(store, clock()).await;

    let a = request_for(tenant.clone(), "A", Vec::new(), 2);
    let b = request_for(tenant.clone(), "B", vec![output("A", 0)], 0);
    let c = request_for(tenant.clone(), "C", vec![output("A", 0)], 0);

    let results = checker.process(vec![a, b.clone(), c]).await.unwrap();
    assert!(results[0].1.is_accepted());
    assert!(results[1].1.is_accepted());
    assert_eq!(
        error_of(&results[2].1),
        &UniquenessCheckError::InputStateConflict {
            conflicting_states: vec![StateDetail::consumed(output("A", 0), tx("B"))],
        }
    );

    let replayed = checker.process(vec![b]).await.unwrap().remove(0).1;
    assert_eq!(replayed, results[1].1);
}

#[tokio::test]
async fn test_cold_replay_matches_first_answer() {
    let Some(store) = store().await else { return };
    let tenant = fresh_tenant();
    let clock = Arc::new(ManualClock::new(
        t0() + Duration::minutes(30) + Duration::nanoseconds(987_654_321),
    ));

    let first = started_checker(store.clone(), clock.clone()).await;
    let results = first
        .process(vec![
            request_for(tenant.clone(), "A", Vec::new(), 1),
            request_for(tenant.clone(), "B", vec![output("missing", 0)], 0),
        ])
        .await
        .unwrap();
    first.stop();

    clock.advance(Duration::minutes(5));
    let cold = started_checker(store, clock).await;
    let replayed = cold
        .process(vec![
            request_for(tenant.clone(), "A", Vec::new(), 1),
            request_for(tenant, "B", vec![output("missing", 0)], 0),
        ])
        .await
        .unwrap();

    assert_eq!(replayed[0].1, results[0].1);
    assert_eq!(replayed[1].1, results[1].1);
    assert!(results[0].1.is_accepted());
    assert_eq!(error_of(&results[1].1).kind(), "input_state_unknown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_spenders_exactly_one_accepted() {
    let Some(store) = store().await else { return };
    let tenant = fresh_tenant();
    let checker = Arc::new(started_checker(store, clock()).await);
    checker
        .process(vec![request_for(tenant.clone(), "issue", Vec::new(), 1)])
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let checker = Arc::clone(&checker);
        let request = request_for(
            tenant.clone(),
            &format!("spender-{i}"),
            vec![output("issue", 0)],
            0,
        );
        handles.push(tokio::spawn(async move {
            checker
                .process(vec![request])
                .await
                .map(|mut results| results.remove(0).1)
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        if result.is_accepted() {
            accepted += 1;
        } else {
            assert_eq!(error_of(&result).kind(), "input_state_conflict");
        }
    }
    assert_eq!(accepted, 1);
}

#[tokio::test]
async fn test_unstorable_bounds_reject_without_failing_batch() {
    let Some(store) = store().await else { return };
    let tenant = fresh_tenant();
    let checker = started_checker(store.clone(), clock()).await;
    checker
        .process(vec![request_for(tenant.clone(), "issue", Vec::new(), 1)])
        .await
        .unwrap();

    let long_algorithm = SecureHash::new("X".repeat(40), vec![1, 2, 3]);

    let mut long_input = request_for(tenant.clone(), "long-input", Vec::new(), 0);
    long_input.input_states = vec![StateRef::new(long_algorithm.clone(), 0)];
    let mut huge_index = request_for(tenant.clone(), "huge-index", Vec::new(), 0);
    huge_index.input_states = vec![StateRef::new(tx("issue"), 3_000_000_000)];
    let too_many_outputs = request_for(tenant.clone(), "too-many-outputs", Vec::new(), u32::MAX);
    let mut long_tx_id = request_for(tenant.clone(), "ignored", Vec::new(), 1);
    long_tx_id.tx_id = long_algorithm;

    let results = checker
        .process(vec![
            long_input,
            huge_index,
            too_many_outputs,
            long_tx_id,
            request_for(tenant.clone(), "valid", vec![output("issue", 0)], 1),
        ])
        .await
        .unwrap();

    for (_, result) in &results[..4] {
        assert_eq!(error_of(result).kind(), "malformed_request");
    }
    assert!(results[4].1.is_accepted());

    let mut session = store.session(&tenant).await.unwrap();
    let stored = session
        .get_transaction_details(&[tx("long-input"), tx("huge-index"), tx("too-many-outputs")])
        .await
        .unwrap();
    assert_eq!(stored.len(), 3);
}
