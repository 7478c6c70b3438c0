//! Integration tests for issuance under concurrent load.

mod helpers;

use std::time::Duration;

use claimgate_cache::keys;
use claimgate_core::error::ErrorKind;
use claimgate_core::traits::lock::DistributedLock;
use claimgate_core::types::RequesterId;
use futures::future::join_all;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_no_oversell_under_contention() {
    let engine = helpers::TestEngine::new().await;
    let resource = engine.open_resource(100).await;

    // Twice as many claimants as units.
    let mut tasks = Vec::new();
    for _ in 0..200 {
        let claims = engine.claims.clone();
        let resource_id = resource.id;
        tasks.push(tokio::spawn(async move {
            claims.issue(&resource_id, &RequesterId::new(), 1).await
        }));
    }

    let mut issued = 0;
    let mut exhausted = 0;
    for outcome in join_all(tasks).await {
        match outcome.expect("Task panicked") {
            Ok(_) => issued += 1,
            Err(e) => {
                assert_eq!(e.kind, ErrorKind::Exhausted, "Unexpected error: {e}");
                exhausted += 1;
            }
        }
    }

    assert_eq!(issued, 100, "Every unit must be claimed exactly once");
    assert_eq!(exhausted, 100);
    assert_eq!(
        engine.claims.remaining_capacity(&resource.id).await.unwrap(),
        0
    );
    let row = engine.resources.get(&resource.id).await.unwrap();
    assert_eq!(row.remaining_quantity, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_direct_strategy_never_oversells() {
    let engine = helpers::TestEngine::with_strategy("direct").await;
    let resource = engine.open_resource(60).await;

    let mut tasks = Vec::new();
    for _ in 0..120 {
        let claims = engine.claims.clone();
        let resource_id = resource.id;
        tasks.push(tokio::spawn(async move {
            claims.issue(&resource_id, &RequesterId::new(), 1).await
        }));
    }

    let mut issued = 0;
    for outcome in join_all(tasks).await {
        match outcome.expect("Task panicked") {
            Ok(_) => issued += 1,
            Err(e) => assert_eq!(e.kind, ErrorKind::Exhausted, "Unexpected error: {e}"),
        }
    }

    assert_eq!(issued, 60, "Row locking must cap issuance at capacity");
    let row = engine.resources.get(&resource.id).await.unwrap();
    assert_eq!(row.remaining_quantity, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_unit_has_a_single_winner() {
    let engine = helpers::TestEngine::new().await;
    let resource = engine.open_resource(1).await;

    let a = {
        let claims = engine.claims.clone();
        let resource_id = resource.id;
        tokio::spawn(async move { claims.issue(&resource_id, &RequesterId::new(), 1).await })
    };
    let b = {
        let claims = engine.claims.clone();
        let resource_id = resource.id;
        tokio::spawn(async move { claims.issue(&resource_id, &RequesterId::new(), 1).await })
    };

    let outcomes = [
        a.await.expect("Task panicked"),
        b.await.expect("Task panicked"),
    ];
    let winners = outcomes.iter().filter(|o| o.is_ok()).count();
    assert_eq!(winners, 1, "Exactly one racer may take the last unit");
    let loser = outcomes
        .iter()
        .find_map(|o| o.as_ref().err())
        .expect("One racer must lose");
    assert_eq!(loser.kind, ErrorKind::Exhausted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_queued_admission_never_overadmits() {
    let engine = helpers::TestEngine::with_strategy("queued").await;
    let resource = engine.open_resource(50).await;

    let mut tasks = Vec::new();
    for _ in 0..100 {
        let claims = engine.claims.clone();
        let resource_id = resource.id;
        tasks.push(tokio::spawn(async move {
            claims.issue(&resource_id, &RequesterId::new(), 1).await
        }));
    }

    let mut admitted = 0;
    for outcome in join_all(tasks).await {
        match outcome.expect("Task panicked") {
            Ok(_) => admitted += 1,
            Err(e) => assert_eq!(e.kind, ErrorKind::Exhausted, "Unexpected error: {e}"),
        }
    }
    assert_eq!(admitted, 50, "Admission must stop exactly at capacity");

    // Everything admitted lands durably; nothing more.
    assert_eq!(engine.fulfill_queued().await, 50);
    let row = engine.resources.get(&resource.id).await.unwrap();
    assert_eq!(row.remaining_quantity, 0);
    assert_eq!(engine.claims.metrics().pending, 50);
}

#[tokio::test]
async fn test_expired_lease_does_not_block_issuance() {
    let engine = helpers::TestEngine::new().await;
    let resource = engine.open_resource(5).await;

    // Take the resource lock with a short lease and never release it,
    // as a crashed holder would.
    let _guard = engine
        .lock
        .acquire(
            &keys::resource_lock(&resource.id),
            Duration::from_secs(1),
            Duration::from_millis(50),
        )
        .await
        .expect("Lock acquire failed");

    let ticket = engine
        .claims
        .issue(&resource.id, &RequesterId::new(), 1)
        .await
        .expect("Issue must proceed once the stale lease expires");
    assert_eq!(ticket.status, claimgate_entity::claim::ClaimStatus::Issued);
}
