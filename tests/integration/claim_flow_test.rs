//! Integration tests for the claim lifecycle: issue, status, use, cancel.

mod helpers;

use chrono::{Duration, Utc};

use claimgate_core::error::ErrorKind;
use claimgate_core::traits::counter::QuantityCounter;
use claimgate_core::types::RequesterId;
use claimgate_entity::claim::ClaimStatus;
use claimgate_entity::resource::CreateResource;

#[tokio::test]
async fn test_issue_and_get_status() {
    let engine = helpers::TestEngine::new().await;
    let resource = engine.open_resource(10).await;
    let requester = RequesterId::new();

    let ticket = engine
        .claims
        .issue(&resource.id, &requester, 2)
        .await
        .expect("Issue failed");

    assert_eq!(ticket.status, ClaimStatus::Issued);
    assert_eq!(ticket.code.len(), 12);

    let claim = engine
        .claims
        .get_status(&ticket.claim_id, &requester)
        .await
        .expect("Status lookup failed");
    assert_eq!(claim.status, ClaimStatus::Issued);
    assert_eq!(claim.quantity, 2);
    assert_eq!(claim.code, ticket.code);

    let remaining = engine
        .claims
        .remaining_capacity(&resource.id)
        .await
        .expect("Capacity lookup failed");
    assert_eq!(remaining, 8);
}

#[tokio::test]
async fn test_issue_rejects_nonpositive_quantity() {
    let engine = helpers::TestEngine::new().await;
    let resource = engine.open_resource(10).await;
    let requester = RequesterId::new();

    let err = engine
        .claims
        .issue(&resource.id, &requester, 0)
        .await
        .expect_err("Zero quantity must be rejected");
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = engine
        .claims
        .issue(&resource.id, &requester, -3)
        .await
        .expect_err("Negative quantity must be rejected");
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_issue_respects_claim_window() {
    let engine = helpers::TestEngine::new().await;
    let requester = RequesterId::new();
    let now = Utc::now();

    let not_open_yet = engine
        .resources
        .create(CreateResource {
            name: "future".into(),
            total_quantity: 5,
            valid_from: now + Duration::hours(1),
            valid_until: now + Duration::hours(2),
        })
        .await
        .expect("Create failed");
    let err = engine
        .claims
        .issue(&not_open_yet.id, &requester, 1)
        .await
        .expect_err("Claim before the window must fail");
    assert_eq!(err.kind, ErrorKind::OutOfWindow);

    let already_closed = engine
        .resources
        .create(CreateResource {
            name: "past".into(),
            total_quantity: 5,
            valid_from: now - Duration::hours(2),
            valid_until: now - Duration::hours(1),
        })
        .await
        .expect("Create failed");
    let err = engine
        .claims
        .issue(&already_closed.id, &requester, 1)
        .await
        .expect_err("Claim after the window must fail");
    assert_eq!(err.kind, ErrorKind::OutOfWindow);
}

#[tokio::test]
async fn test_exhaustion_and_metrics() {
    let engine = helpers::TestEngine::new().await;
    let resource = engine.open_resource(3).await;

    for _ in 0..3 {
        engine
            .claims
            .issue(&resource.id, &RequesterId::new(), 1)
            .await
            .expect("Issue within capacity failed");
    }

    let err = engine
        .claims
        .issue(&resource.id, &RequesterId::new(), 1)
        .await
        .expect_err("Claim beyond capacity must fail");
    assert_eq!(err.kind, ErrorKind::Exhausted);

    let metrics = engine.claims.metrics();
    assert_eq!(metrics.attempts, 4);
    assert_eq!(metrics.issued, 3);
    assert_eq!(metrics.exhausted, 1);
}

#[tokio::test]
async fn test_use_claim_records_order_ref() {
    let engine = helpers::TestEngine::new().await;
    let resource = engine.open_resource(5).await;
    let requester = RequesterId::new();
    let ticket = engine
        .claims
        .issue(&resource.id, &requester, 1)
        .await
        .expect("Issue failed");

    let used = engine
        .claims
        .use_claim(&ticket.claim_id, &requester, "order-42")
        .await
        .expect("Use failed");
    assert_eq!(used.status, ClaimStatus::Used);
    assert_eq!(used.order_ref.as_deref(), Some("order-42"));
    assert!(used.used_at.is_some());

    // A second redemption must be rejected, not silently absorbed.
    let err = engine
        .claims
        .use_claim(&ticket.claim_id, &requester, "order-43")
        .await
        .expect_err("Second use must fail");
    assert_eq!(err.kind, ErrorKind::AlreadyUsed);
}

#[tokio::test]
async fn test_use_claim_requires_order_ref() {
    let engine = helpers::TestEngine::new().await;
    let resource = engine.open_resource(5).await;
    let requester = RequesterId::new();
    let ticket = engine
        .claims
        .issue(&resource.id, &requester, 1)
        .await
        .expect("Issue failed");

    let err = engine
        .claims
        .use_claim(&ticket.claim_id, &requester, "   ")
        .await
        .expect_err("Blank order ref must be rejected");
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_cancel_restores_capacity() {
    let engine = helpers::TestEngine::new().await;
    let resource = engine.open_resource(5).await;
    let requester = RequesterId::new();

    let ticket = engine
        .claims
        .issue(&resource.id, &requester, 2)
        .await
        .expect("Issue failed");
    assert_eq!(
        engine.claims.remaining_capacity(&resource.id).await.unwrap(),
        3
    );

    let cancelled = engine
        .claims
        .cancel_claim(&ticket.claim_id, &requester)
        .await
        .expect("Cancel failed");
    assert_eq!(cancelled.status, ClaimStatus::Cancelled);
    assert_eq!(
        engine.claims.remaining_capacity(&resource.id).await.unwrap(),
        5
    );

    // The returned units are claimable again.
    engine
        .claims
        .issue(&resource.id, &requester, 5)
        .await
        .expect("Issue after cancel failed");
}

#[tokio::test]
async fn test_cancel_twice_fails() {
    let engine = helpers::TestEngine::new().await;
    let resource = engine.open_resource(5).await;
    let requester = RequesterId::new();
    let ticket = engine
        .claims
        .issue(&resource.id, &requester, 1)
        .await
        .expect("Issue failed");

    engine
        .claims
        .cancel_claim(&ticket.claim_id, &requester)
        .await
        .expect("First cancel failed");
    let err = engine
        .claims
        .cancel_claim(&ticket.claim_id, &requester)
        .await
        .expect_err("Second cancel must fail");
    assert_eq!(err.kind, ErrorKind::AlreadyCancelled);
}

#[tokio::test]
async fn test_used_claim_can_still_be_cancelled() {
    let engine = helpers::TestEngine::new().await;
    let resource = engine.open_resource(5).await;
    let requester = RequesterId::new();
    let ticket = engine
        .claims
        .issue(&resource.id, &requester, 2)
        .await
        .expect("Issue failed");

    engine
        .claims
        .use_claim(&ticket.claim_id, &requester, "order-1")
        .await
        .expect("Use failed");
    let cancelled = engine
        .claims
        .cancel_claim(&ticket.claim_id, &requester)
        .await
        .expect("Cancel of a used claim failed");
    assert_eq!(cancelled.status, ClaimStatus::Cancelled);
    assert_eq!(
        engine.claims.remaining_capacity(&resource.id).await.unwrap(),
        5
    );

    // Cancelled means unusable, even though it was used before.
    let err = engine
        .claims
        .use_claim(&ticket.claim_id, &requester, "order-2")
        .await
        .expect_err("Use after cancel must fail");
    assert_eq!(err.kind, ErrorKind::AlreadyCancelled);
}

#[tokio::test]
async fn test_claims_are_invisible_to_other_requesters() {
    let engine = helpers::TestEngine::new().await;
    let resource = engine.open_resource(5).await;
    let owner = RequesterId::new();
    let stranger = RequesterId::new();
    let ticket = engine
        .claims
        .issue(&resource.id, &owner, 1)
        .await
        .expect("Issue failed");

    let err = engine
        .claims
        .get_status(&ticket.claim_id, &stranger)
        .await
        .expect_err("Stranger must not see the claim");
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = engine
        .claims
        .use_claim(&ticket.claim_id, &stranger, "order-1")
        .await
        .expect_err("Stranger must not use the claim");
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = engine
        .claims
        .cancel_claim(&ticket.claim_id, &stranger)
        .await
        .expect_err("Stranger must not cancel the claim");
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_claims_for_lists_own_claims() {
    let engine = helpers::TestEngine::new().await;
    let resource = engine.open_resource(10).await;
    let requester = RequesterId::new();

    engine
        .claims
        .issue(&resource.id, &requester, 1)
        .await
        .expect("Issue failed");
    engine
        .claims
        .issue(&resource.id, &requester, 2)
        .await
        .expect("Issue failed");
    engine
        .claims
        .issue(&resource.id, &RequesterId::new(), 3)
        .await
        .expect("Issue failed");

    let mine = engine
        .claims
        .claims_for(&requester)
        .await
        .expect("List failed");
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|c| c.requester_id == requester));
}

#[tokio::test]
async fn test_direct_strategy_full_lifecycle() {
    let engine = helpers::TestEngine::with_strategy("direct").await;
    let resource = engine.open_resource(2).await;
    let requester = RequesterId::new();

    let ticket = engine
        .claims
        .issue(&resource.id, &requester, 2)
        .await
        .expect("Issue failed");
    assert_eq!(ticket.status, ClaimStatus::Issued);

    let err = engine
        .claims
        .issue(&resource.id, &requester, 1)
        .await
        .expect_err("Claim beyond capacity must fail");
    assert_eq!(err.kind, ErrorKind::Exhausted);

    engine
        .claims
        .cancel_claim(&ticket.claim_id, &requester)
        .await
        .expect("Cancel failed");
    engine
        .claims
        .issue(&resource.id, &requester, 1)
        .await
        .expect("Issue after cancel failed");
}

#[tokio::test]
async fn test_remaining_capacity_reseeds_a_lost_counter() {
    let engine = helpers::TestEngine::new().await;
    let resource = engine.open_resource(7).await;

    // Simulate a counter wiped by a fast-path restart.
    engine
        .counter
        .remove(&resource.id)
        .await
        .expect("Counter remove failed");

    let remaining = engine
        .claims
        .remaining_capacity(&resource.id)
        .await
        .expect("Capacity lookup failed");
    assert_eq!(remaining, 7);
    assert_eq!(engine.counter.get(&resource.id).await.unwrap(), Some(7));
}
